use crate::error::RetryError;
use crate::feeds::{KeywordSource, ReportOptions, ReportResult};
use crate::fetch::{Completion, FetchLifecycle, FetchState, Operation};
use crate::ui::widgets::Panel;
use futures::FutureExt;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};
use std::sync::Arc;

pub type ReportCompletion = Completion<String, ReportResult>;

/// What the panel currently has to show for the selected keyword.
#[derive(Debug, PartialEq)]
pub enum ReportView<'a> {
    Closed,
    Loading { keyword: &'a str },
    Failed { keyword: &'a str, message: &'a str },
    Ready(&'a ReportResult),
}

pub struct ReportPanel {
    title: String,
    reports: FetchLifecycle<String, ReportResult>,
    selected: Option<String>,
    scroll: u16,
}

impl ReportPanel {
    pub fn new(source: Arc<dyn KeywordSource>, options: ReportOptions) -> Self {
        let operation: Operation<String, ReportResult> = Arc::new(move |keyword: String| {
            let source = source.clone();
            let options = options.clone();
            async move { source.fetch_report(&keyword, &options).await }.boxed()
        });

        Self {
            title: "Detailed Report".to_string(),
            reports: FetchLifecycle::new("report", operation),
            selected: None,
            scroll: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.selected.is_some()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Opens the panel on `keyword` and starts a fresh report fetch. Whatever
    /// was pending for the previous keyword is dropped.
    pub fn select(&mut self, keyword: String) {
        if let Some(previous) = self.selected.take() {
            if previous != keyword {
                self.reports.forget(&previous);
            }
        }
        self.scroll = 0;
        self.reports.trigger(keyword.clone());
        self.selected = Some(keyword);
    }

    /// Closes the panel and drops every held report, error and pending fetch.
    pub fn close(&mut self) {
        self.selected = None;
        self.scroll = 0;
        self.reports.clear();
    }

    pub fn retry(&mut self) -> Result<(), RetryError> {
        let keyword = self.selected.clone().ok_or(RetryError::NotInError)?;
        self.reports.retry(keyword)?;
        self.scroll = 0;
        Ok(())
    }

    pub async fn next_completion(&mut self) -> Option<ReportCompletion> {
        self.reports.next_completion().await
    }

    pub fn on_completion(&mut self, completion: ReportCompletion) -> bool {
        self.reports.settle(completion)
    }

    pub fn view(&self) -> ReportView<'_> {
        let Some(keyword) = self.selected.as_deref() else {
            return ReportView::Closed;
        };

        match self.reports.state(&keyword.to_string()) {
            FetchState::Idle | FetchState::Loading => ReportView::Loading { keyword },
            FetchState::Error { message } => ReportView::Failed { keyword, message },
            FetchState::Success { value, .. } => ReportView::Ready(value),
        }
    }

    pub fn scroll_up(&mut self) {
        self.scroll = self.scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        if matches!(self.view(), ReportView::Ready(_)) {
            self.scroll = self.scroll.saturating_add(1);
        }
    }
}

/// One display line per newline in the report text. Nothing else is
/// interpreted.
pub fn report_lines(report: &str) -> Vec<&str> {
    report
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

fn wrapped_lines(report: &str, width: u16) -> Vec<Line<'static>> {
    let width = width.max(1) as usize;
    report_lines(report)
        .into_iter()
        .flat_map(|line| {
            if line.is_empty() {
                vec![Line::from("")]
            } else {
                textwrap::wrap(line, width)
                    .into_iter()
                    .map(|part| Line::from(part.into_owned()))
                    .collect()
            }
        })
        .collect()
}

fn center_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

impl Panel for ReportPanel {
    fn title(&self) -> &str {
        &self.title
    }

    fn render(&self, frame: &mut Frame, area: Rect, focused: bool) {
        let view = self.view();
        if view == ReportView::Closed {
            return;
        }

        let modal_area = center_rect(80, 80, area);
        frame.render_widget(Clear, modal_area);

        let border = if focused { Color::Cyan } else { Color::Gray };
        let keyword = self.selected.as_deref().unwrap_or_default();
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(format!(" {} - {} ", keyword, self.title))
            .title_bottom(Line::from(" Esc: close | r: retry | j/k: scroll ").right_aligned());

        let inner = block.inner(modal_area);
        frame.render_widget(block, modal_area);

        let hint = Style::default().fg(Color::DarkGray);
        let (lines, alignment) = match view {
            ReportView::Closed | ReportView::Loading { .. } => (
                vec![Line::from(""), Line::from("Generating report...")],
                Alignment::Center,
            ),
            ReportView::Failed { message, .. } => (
                vec![
                    Line::from(""),
                    Line::from(Span::styled(
                        "Failed to generate the report",
                        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                    )),
                    Line::from(message.to_string()),
                    Line::from(""),
                    Line::from(Span::styled("Press r to retry", hint)),
                ],
                Alignment::Center,
            ),
            ReportView::Ready(result) => {
                let mut lines = wrapped_lines(&result.report, inner.width);
                lines.push(Line::from(""));
                lines.push(Line::from(vec![
                    Span::styled("Generated: ", hint.add_modifier(Modifier::BOLD)),
                    Span::styled(
                        result
                            .generated_at
                            .with_timezone(&chrono::Local)
                            .format("%Y-%m-%d %H:%M:%S")
                            .to_string(),
                        hint,
                    ),
                ]));
                lines.push(Line::from(vec![
                    Span::styled("Keyword: ", hint.add_modifier(Modifier::BOLD)),
                    Span::styled(result.keyword.clone(), hint),
                ]));
                (lines, Alignment::Left)
            }
        };

        let paragraph = Paragraph::new(lines)
            .alignment(alignment)
            .scroll((self.scroll, 0));
        frame.render_widget(paragraph, inner);
    }
}
