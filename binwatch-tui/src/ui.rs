use std::slice;

use binwatch_core::{
    Bin, BinId, BoundingBox, Coordinate, FillBucket, FillSeverity, OverflowPrediction, Priority,
    format_time_remaining, overflow_timeline,
};
use chrono::{DateTime, Local, Utc};
use ratatui::{
    prelude::*,
    symbols::Marker,
    widgets::{
        Bar, BarChart, BarGroup, Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row,
        Table, Wrap,
        canvas::{Canvas, Line as CanvasLine},
    },
};

use crate::app::{App, FormField, Screen, ToastKind};

const MAP_PADDING: f64 = 0.1;

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: title, main content, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, status_area] = chunks else {
        return;
    };

    let now = Utc::now();

    frame.render_widget(header(app), *header_area);

    // Main screen
    match app.screen {
        Screen::Dashboard => draw_dashboard(frame, app, *content_area, now),
        Screen::Analytics => draw_analytics(frame, app, *content_area, now),
        Screen::AddBin => draw_add_bin(frame, app, *content_area),
        Screen::Route => draw_route(frame, app, *content_area),
    }

    frame.render_widget(status_bar(app), *status_area);
}

fn header(app: &App) -> Paragraph<'static> {
    let tab = |screen: Screen, label: &'static str| {
        if app.screen == screen {
            Span::styled(
                label,
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Span::raw(label)
        }
    };

    let feed = if app.live_updates {
        Span::styled("● live", Style::default().fg(Color::Green))
    } else {
        Span::styled("○ offline", Style::default().fg(Color::DarkGray))
    };

    let fetched = app
        .state
        .snapshot
        .as_ref()
        .map(|snapshot| {
            snapshot
                .fetched_at
                .with_timezone(&Local)
                .format("updated %H:%M:%S")
                .to_string()
        })
        .unwrap_or_default();

    let line = Line::from(vec![
        tab(Screen::Dashboard, "Dashboard"),
        Span::raw(" | "),
        tab(Screen::Analytics, "Analytics"),
        Span::raw("   "),
        feed,
        Span::raw("  "),
        Span::styled(fetched, Style::default().fg(Color::DarkGray)),
    ]);

    Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Binwatch – smart waste bin monitoring"),
    )
}

fn status_bar(app: &App) -> Paragraph<'static> {
    let nav_hint = match app.screen {
        Screen::Dashboard => {
            "↑/↓ select · a add · c collected · d delete · r route · l locate · Tab analytics · R refresh · q quit"
        }
        Screen::Analytics => "Tab/Esc dashboard · R refresh · q/Ctrl-C quit",
        Screen::AddBin => {
            "Tab/↓ next field · Shift-Tab/↑ previous · Enter save · Esc cancel · Ctrl-C quit"
        }
        Screen::Route => "Esc/x close route · q/Ctrl-C quit",
    };

    let (status_text, status_style) = if app.is_busy {
        (
            format!("Working… · {nav_hint}"),
            Style::default().fg(Color::Yellow),
        )
    } else if let Some(toast) = app.latest_toast() {
        let color = match toast.kind {
            ToastKind::Success => Color::Green,
            ToastKind::Error => Color::Red,
        };
        (
            format!("{} · {nav_hint}", toast.message),
            Style::default().fg(color),
        )
    } else if app.state.loading {
        (
            format!("Loading bins… · {nav_hint}"),
            Style::default().fg(Color::Yellow),
        )
    } else if let Some(err) = &app.state.last_error {
        (
            format!("Failed to fetch bins: {err} · {nav_hint}"),
            Style::default().fg(Color::Red),
        )
    } else {
        (nav_hint.to_owned(), Style::default())
    };

    Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true })
}

fn draw_dashboard(frame: &mut Frame<'_>, app: &App, area: Rect, now: DateTime<Utc>) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // stat cards
            Constraint::Min(0),    // map + list
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [cards_area, body_area] = chunks else {
        return;
    };

    draw_stat_cards(frame, app, *cards_area);

    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(*body_area);

    let body = body_chunks.as_ref();
    let [map_area, list_area] = body else {
        return;
    };

    let map = MapView {
        title: "Bin locations",
        bins: app.state.bins(),
        selected: app.selected_bin().map(|bin| &bin.id),
        origin: app.user_location(),
        path: &[],
    };
    draw_map(frame, *map_area, &map);
    draw_bin_list(frame, app, *list_area, now);
}

fn draw_stat_cards(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let stats = app.service.stats();

    let card_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(area);

    let cards = [
        ("Total bins", stats.total.to_string(), Color::Cyan),
        (
            "Average fill",
            format!("{}%", stats.average_fill),
            severity_color(FillSeverity::from_level(stats.average_fill)),
        ),
        ("Full (≥80%)", stats.full.to_string(), Color::Yellow),
        ("Urgent", stats.urgent.to_string(), Color::Red),
    ];

    for ((title, value, color), card_area) in cards.into_iter().zip(card_chunks.iter()) {
        let card = Paragraph::new(Span::styled(
            value,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(card, *card_area);
    }
}

fn draw_bin_list(frame: &mut Frame<'_>, app: &App, area: Rect, now: DateTime<Utc>) {
    let bins = app.state.bins();

    let rejected = app
        .state
        .snapshot
        .as_ref()
        .map_or(0, |snapshot| snapshot.rejected.len());
    let title = if rejected > 0 {
        format!("Bins ({}) · {rejected} invalid rows skipped", bins.len())
    } else {
        format!("Bins ({})", bins.len())
    };

    let items = if bins.is_empty() {
        vec![ListItem::new("No bins yet. Press `a` to add one.")]
    } else {
        bins.iter().map(|bin| bin_item(bin, now)).collect()
    };

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = ListState::default();
    if !bins.is_empty() {
        state.select(Some(app.list_index));
    }
    frame.render_stateful_widget(list, area, &mut state);
}

fn bin_item(bin: &Bin, now: DateTime<Utc>) -> ListItem<'static> {
    let color = severity_color(FillSeverity::of(bin));

    let mut headline = vec![
        Span::styled(
            bin.location.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(format!("{}%", bin.fill_level), Style::default().fg(color)),
        Span::raw("  "),
        Span::styled(bin.status.to_string(), Style::default().fg(Color::Gray)),
    ];
    if bin.status_diverges() {
        headline.push(Span::styled(
            "  status mismatch",
            Style::default().fg(Color::Magenta),
        ));
    }

    let collected = bin
        .last_collection
        .map_or_else(|| "never".to_owned(), |at| ago(at, now));
    let details = Line::from(Span::styled(
        format!(
            "  updated {} · collected {collected} · {} L",
            ago(bin.last_updated, now),
            bin.capacity
        ),
        Style::default().fg(Color::DarkGray),
    ));

    ListItem::new(vec![Line::from(headline), details])
}

fn draw_analytics(frame: &mut Frame<'_>, app: &App, area: Rect, now: DateTime<Utc>) {
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(45), Constraint::Min(0)])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [charts_area, table_area] = chunks else {
        return;
    };

    let chart_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 3); 3])
        .split(*charts_area);

    let charts = chart_chunks.as_ref();
    let [histogram_area, route_area, timeline_area] = charts else {
        return;
    };

    let predictions = app.service.predictions(now);

    draw_histogram(frame, app, *histogram_area);
    draw_route_priorities(frame, app, *route_area);
    draw_timeline(frame, &predictions, *timeline_area);
    draw_predictions(frame, &predictions, *table_area);
}

fn draw_histogram(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let histogram = app.service.histogram();

    let bars: Vec<Bar<'_>> = histogram
        .entries()
        .into_iter()
        .map(|(bucket, count)| {
            Bar::default()
                .label(Line::from(bucket.label()))
                .value(to_u64(count))
                .style(Style::default().fg(bucket_color(bucket)))
        })
        .collect();

    let chart = BarChart::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Fill level distribution"),
        )
        .bar_width(7)
        .bar_gap(2)
        .data(BarGroup::default().bars(&bars));

    frame.render_widget(chart, area);
}

fn draw_route_priorities(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Collection route priority");

    let stops = app.service.route_priorities();
    if stops.is_empty() {
        let paragraph = Paragraph::new("No bins above 70% right now.")
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    }

    let bars: Vec<Bar<'_>> = stops
        .iter()
        .map(|stop| {
            Bar::default()
                .label(Line::from(stop.bin.location.as_str()))
                .value(u64::from(stop.score))
                .text_value(format!("{}%", stop.bin.fill_level))
                .style(Style::default().fg(severity_color(FillSeverity::of(&stop.bin))))
        })
        .collect();

    let chart = BarChart::default()
        .block(block)
        .bar_width(6)
        .bar_gap(1)
        .max(100)
        .data(BarGroup::default().bars(&bars));

    frame.render_widget(chart, area);
}

fn draw_timeline(frame: &mut Frame<'_>, predictions: &[OverflowPrediction], area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Overflow timeline (now → full)");

    let timeline = overflow_timeline(predictions);
    if timeline.is_empty() {
        let paragraph = Paragraph::new("Nothing is close to overflowing.")
            .block(block)
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    }

    let groups: Vec<(String, [Bar<'_>; 2])> = timeline
        .iter()
        .map(|point| {
            (
                point.label.clone(),
                [
                    Bar::default()
                        .value(u64::from(point.current))
                        .style(Style::default().fg(Color::Yellow)),
                    Bar::default()
                        .value(u64::from(point.predicted))
                        .text_value(format!("{}h", point.hours))
                        .style(Style::default().fg(Color::Red)),
                ],
            )
        })
        .collect();

    let chart = groups.iter().fold(
        BarChart::default()
            .block(block)
            .bar_width(4)
            .bar_gap(0)
            .group_gap(2)
            .max(100),
        |chart, (label, bars)| {
            chart.data(
                BarGroup::default()
                    .label(Line::from(label.as_str()))
                    .bars(bars),
            )
        },
    );

    frame.render_widget(chart, area);
}

fn draw_predictions(frame: &mut Frame<'_>, predictions: &[OverflowPrediction], area: Rect) {
    let title = "Overflow predictions";

    if predictions.is_empty() {
        let paragraph = Paragraph::new("All bins are operating within safe capacity.")
            .block(Block::default().borders(Borders::ALL).title(title))
            .style(Style::default().fg(Color::Green))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    }

    let rows = predictions.iter().map(|prediction| {
        let eta = prediction.estimated_overflow.map_or_else(
            || "–".to_owned(),
            |at| at.with_timezone(&Local).format("%a %d %b %H:%M").to_string(),
        );

        Row::new(vec![
            Cell::from(prediction.bin.location.clone()),
            Cell::from(prediction.priority.as_str().to_uppercase())
                .style(Style::default().fg(priority_color(prediction.priority))),
            Cell::from(format!("{}%", prediction.bin.fill_level)),
            Cell::from(format!("{:.2}%/h", prediction.fill_rate)),
            Cell::from(format!("{}h", prediction.hours_since_collection)),
            Cell::from(format_time_remaining(prediction.hours_to_full))
                .style(Style::default().add_modifier(Modifier::BOLD)),
            Cell::from(eta),
        ])
    });

    let column_widths = [
        Constraint::Min(18),
        Constraint::Length(9),
        Constraint::Length(6),
        Constraint::Length(9),
        Constraint::Length(17),
        Constraint::Length(9),
        Constraint::Length(17),
    ];

    let table = Table::new(rows, column_widths)
        .header(
            Row::new(vec![
                "Location",
                "Priority",
                "Fill",
                "Rate",
                "Since collection",
                "Full in",
                "Overflow at",
            ])
            .style(Style::default().add_modifier(Modifier::BOLD)),
        )
        .block(Block::default().borders(Borders::ALL).title(title))
        .column_spacing(1);

    frame.render_widget(table, area);
}

fn draw_add_bin(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let mut constraints = vec![Constraint::Length(3); FormField::ALL.len()];
    constraints.push(Constraint::Min(0));

    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    for (field, field_area) in FormField::ALL.into_iter().zip(layout_chunks.iter()) {
        let focused = app.form.focus == field;
        let border_style = if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };

        let value = app.form.value(field);
        let input = Paragraph::new(value).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(field.label()),
        );
        frame.render_widget(input, *field_area);

        if focused {
            let offset = u16::try_from(value.chars().count()).unwrap_or(u16::MAX);
            frame.set_cursor_position((
                field_area.x.saturating_add(1).saturating_add(offset),
                field_area.y.saturating_add(1),
            ));
        }
    }

    if let Some(help_area) = layout_chunks.last() {
        let help = Paragraph::new(
            "New bins start empty and operational. Capacity defaults to 100 liters.",
        )
        .block(Block::default().borders(Borders::ALL).title("Add new bin"))
        .style(Style::default().fg(Color::DarkGray))
        .wrap(Wrap { trim: true });
        frame.render_widget(help, *help_area);
    }
}

fn draw_route(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let Some(active) = &app.route else {
        let paragraph = Paragraph::new("No route selected.")
            .block(Block::default().borders(Borders::ALL).title("Route"));
        frame.render_widget(paragraph, area);
        return;
    };

    let layout_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [map_area, panel_area] = chunks else {
        return;
    };

    let map = MapView {
        title: "Route",
        bins: slice::from_ref(&active.bin),
        selected: Some(&active.bin.id),
        origin: Some(active.origin),
        path: &active.route.path,
    };
    draw_map(frame, *map_area, &map);

    let severity = severity_color(FillSeverity::of(&active.bin));
    let lines = vec![
        Line::from(Span::styled(
            format!("Route to {}", active.bin.location),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::raw("Fill level: "),
            Span::styled(
                format!("{}%", active.bin.fill_level),
                Style::default().fg(severity),
            ),
        ]),
        Line::from(""),
        Line::from(active.route.summary()),
        Line::from(""),
        Line::from(Span::styled(
            "Follow the route on the map.",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let panel = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Directions"))
        .wrap(Wrap { trim: true });
    frame.render_widget(panel, *panel_area);
}

/// What to paint on a map canvas.
struct MapView<'a> {
    title: &'a str,
    bins: &'a [Bin],
    selected: Option<&'a BinId>,
    origin: Option<Coordinate>,
    path: &'a [Coordinate],
}

fn draw_map(frame: &mut Frame<'_>, area: Rect, view: &MapView<'_>) {
    let bounds = BoundingBox::fit(
        view.bins
            .iter()
            .map(|bin| bin.coordinate)
            .chain(view.origin)
            .chain(view.path.iter().copied()),
        MAP_PADDING,
    );

    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(view.title))
        .marker(Marker::Braille)
        .x_bounds([bounds.min_longitude, bounds.max_longitude])
        .y_bounds([bounds.min_latitude, bounds.max_latitude])
        .paint(|ctx| {
            for segment in view.path.windows(2) {
                if let [from, to] = segment {
                    ctx.draw(&CanvasLine {
                        x1: from.longitude,
                        y1: from.latitude,
                        x2: to.longitude,
                        y2: to.latitude,
                        color: Color::Cyan,
                    });
                }
            }
            ctx.layer();

            for bin in view.bins {
                let color = severity_color(FillSeverity::of(bin));
                let glyph = if view.selected == Some(&bin.id) {
                    Span::styled("◆", Style::default().fg(color).add_modifier(Modifier::BOLD))
                } else {
                    Span::styled("●", Style::default().fg(color))
                };
                ctx.print(bin.coordinate.longitude, bin.coordinate.latitude, glyph);
            }

            if let Some(origin) = view.origin {
                ctx.print(
                    origin.longitude,
                    origin.latitude,
                    Span::styled("◎ you", Style::default().fg(Color::Cyan)),
                );
            }
        });

    frame.render_widget(canvas, area);
}

fn severity_color(severity: FillSeverity) -> Color {
    match severity {
        FillSeverity::Normal => Color::Green,
        FillSeverity::Moderate => Color::Yellow,
        FillSeverity::Warning | FillSeverity::Critical => Color::Red,
    }
}

fn bucket_color(bucket: FillBucket) -> Color {
    match bucket {
        FillBucket::Quarter1 => Color::Green,
        FillBucket::Quarter2 => Color::Yellow,
        FillBucket::Quarter3 => Color::LightRed,
        FillBucket::Quarter4 => Color::Red,
    }
}

fn priority_color(priority: Priority) -> Color {
    match priority {
        Priority::Critical => Color::Red,
        Priority::High => Color::LightRed,
        Priority::Medium => Color::Yellow,
        Priority::Low => Color::Green,
    }
}

fn to_u64(count: usize) -> u64 {
    u64::try_from(count).unwrap_or(u64::MAX)
}

fn ago(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - at).num_minutes();
    if minutes < 1 {
        "just now".to_owned()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else if minutes < 24 * 60 {
        format!("{}h ago", minutes / 60)
    } else {
        format!("{}d ago", minutes / (24 * 60))
    }
}
