pub mod widgets;

use crate::app::App;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};
use widgets::Panel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenAreas {
    pub header: Rect,
    pub cloud: Rect,
    pub footer: Rect,
    pub full: Rect,
}

pub fn screen_areas(area: Rect) -> ScreenAreas {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(5),
            Constraint::Length(1),
        ])
        .split(area);

    ScreenAreas {
        header: chunks[0],
        cloud: chunks[1],
        footer: chunks[2],
        full: area,
    }
}

pub fn draw(frame: &mut Frame, app: &App, areas: &ScreenAreas) {
    render_header(frame, areas.header);

    let report_open = app.report().is_open();
    app.cloud().render(frame, areas.cloud, !report_open);
    render_footer(frame, areas.footer, report_open);

    if report_open {
        app.report().render(frame, areas.full, true);
    }
}

fn render_header(frame: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from(Span::styled(
            "Reddit Stock Monitor",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            "Stock keywords trending on Reddit, sized by mentions and colored by sentiment",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
}

fn render_footer(frame: &mut Frame, area: Rect, report_open: bool) {
    let help = if report_open {
        "Esc: close report | r: retry | j/k: scroll | q: quit"
    } else {
        "Tab: next keyword | Enter: report | r: retry | R: reload | q: quit"
    };
    frame.render_widget(
        Paragraph::new(Span::styled(help, Style::default().fg(Color::DarkGray))),
        area,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_areas_split() {
        let areas = screen_areas(Rect::new(0, 0, 100, 30));
        assert_eq!(areas.header.height, 2);
        assert_eq!(areas.footer.height, 1);
        assert_eq!(areas.cloud.height, 27);
        assert_eq!(areas.cloud.y, 2);
        assert_eq!(areas.full, Rect::new(0, 0, 100, 30));
    }
}
