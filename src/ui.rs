use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Tabs, Wrap},
};
use std::rc::Rc;

use crate::app::{App, Tab};
use crate::methods::{REGION_RECOMMENDATIONS, lookup_method};
use crate::schedule::{Urgency, describe_remaining, format_countdown};

pub struct LayoutChunks {
    pub header_chunk: Rect,
    pub tabs_chunk: Rect,
    pub body_chunk: Rect,
    pub hint_chunk: Rect,
}

pub fn compute_layout(frame_size: Rect) -> LayoutChunks {
    let main_chunks: Rc<[Rect]> = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Location / clock
            Constraint::Length(3), // Tabs
            Constraint::Min(0),    // Tab body
            Constraint::Length(1), // Key hints / status
        ])
        .split(frame_size);

    LayoutChunks {
        header_chunk: main_chunks[0],
        tabs_chunk: main_chunks[1],
        body_chunk: main_chunks[2],
        hint_chunk: main_chunks[3],
    }
}

pub fn ui(f: &mut Frame, app: &App) {
    let chunks: LayoutChunks = compute_layout(f.size());

    // === Header ===
    let header_text = format!(
        "{}  |  {}  |  {}",
        app.location,
        app.schedule.timezone().name(),
        app.now_local.format("%a %d %b %Y %H:%M:%S")
    );
    let header = Paragraph::new(header_text).style(Style::default().fg(Color::LightGreen)).block(
        Block::default()
            .title("🕌 Islamic Prayer Times")
            .borders(Borders::ALL)
            .style(Style::default().fg(Color::Green)),
    );
    f.render_widget(header, chunks.header_chunk);

    // === Tabs ===
    let tabs = Tabs::new(Tab::TITLES.to_vec())
        .select(app.selected_tab.index())
        .block(Block::default().borders(Borders::ALL))
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    f.render_widget(tabs, chunks.tabs_chunk);

    match app.selected_tab {
        Tab::PrayerTimes => render_prayer_times(f, app, chunks.body_chunk),
        Tab::Details => render_details(f, app, chunks.body_chunk),
    }

    // === Hints ===
    let hint = match &app.status {
        Some(status) => format!(" {}  |  q quit  Tab switch  s remind", status),
        None => " q quit  Tab switch  s remind".to_string(),
    };
    f.render_widget(Paragraph::new(hint).style(Style::default().fg(Color::DarkGray)), chunks.hint_chunk);
}

fn render_prayer_times(f: &mut Frame, app: &App, area: Rect) {
    let columns: Rc<[Rect]> = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    // === Today's schedule (left) ===
    let next_prayer = app.next.as_ref().filter(|n| !n.is_tomorrow()).map(|n| n.prayer());
    let items: Vec<ListItem> = app
        .schedule
        .timings()
        .main_times()
        .into_iter()
        .map(|(prayer, time)| {
            if Some(prayer) == next_prayer {
                ListItem::new(format!("{:<10}{}   ◀ up next", prayer.as_str(), time))
                    .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            } else {
                ListItem::new(format!("{:<10}{}", prayer.as_str(), time))
                    .style(Style::default().fg(Color::White))
            }
        })
        .collect();
    let title = match app.schedule.date_label() {
        Some(date) => format!("Today's Schedule ({})", date),
        None => "Today's Schedule".to_string(),
    };
    let list = List::new(items).block(Block::default().title(title).borders(Borders::ALL));
    f.render_widget(list, columns[0]);

    // === Next prayer countdown (right) ===
    let lines: Vec<Line> = match &app.next {
        Some(next) => {
            let urgency = Urgency::of(next.seconds_remaining(), app.threshold_secs);
            let countdown_style = match urgency {
                Urgency::Imminent => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                Urgency::Soon => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
                Urgency::Later => Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            };
            let mut lines = vec![
                Line::from(vec![
                    Span::raw("Next Prayer: "),
                    Span::styled(next.label(), Style::default().add_modifier(Modifier::BOLD)),
                    Span::raw(format!(" at {}", next.time_str())),
                ]),
                Line::from(""),
                Line::from(Span::styled(format!("⏳ {}", format_countdown(next.seconds_remaining())), countdown_style)),
                Line::from(describe_remaining(next.seconds_remaining())),
                Line::from(""),
            ];
            lines.push(Line::from(match urgency {
                Urgency::Imminent => "🔔 Prayer time approaching! Press s to send a reminder.",
                Urgency::Soon => "⏳ Prayer time approaching soon.",
                Urgency::Later => "A reminder becomes available shortly before the prayer.",
            }));
            if next.is_tomorrow() {
                lines.push(Line::from(""));
                lines.push(Line::from("All prayers for today are complete. See you tomorrow for Fajr!"));
            }
            lines
        }
        None => vec![Line::from("No upcoming prayer could be determined from today's timings.")],
    };
    let countdown = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().title("Countdown").borders(Borders::ALL));
    f.render_widget(countdown, columns[1]);
}

fn render_details(f: &mut Frame, app: &App, area: Rect) {
    let columns: Rc<[Rect]> = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(area);

    // === Additional times (left) ===
    let extra = app.schedule.timings().additional_times();
    let items: Vec<ListItem> = if extra.is_empty() {
        vec![ListItem::new("No additional times with this method.")]
    } else {
        extra.into_iter().map(|(name, time)| ListItem::new(format!("{:<12}{}", name, time))).collect()
    };
    f.render_widget(
        List::new(items).block(Block::default().title("Additional Times").borders(Borders::ALL)),
        columns[0],
    );

    // === Method and recommendations (right) ===
    let mut lines: Vec<Line> = vec![
        Line::from(format!("Method: {}", app.method_name)),
        Line::from(format!("Asr juristic method: {}", app.school.label())),
        Line::from(""),
        Line::from(Span::styled("Regional recommendations", Style::default().add_modifier(Modifier::BOLD))),
    ];
    lines.extend(REGION_RECOMMENDATIONS.iter().map(|(region, id)| {
        let name: &str = lookup_method(*id).map(|m| m.name).unwrap_or("?");
        Line::from(format!("{}: {}", region, name))
    }));
    let details = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().title("Calculation").borders(Borders::ALL));
    f.render_widget(details, columns[1]);
}
