use crate::config::Config;
use crate::feeds::{KeywordSource, ReportOptions};
use crate::ui::{self, widgets::cloud::CloudView, widgets::report::ReportPanel};
use anyhow::Result;
use crossterm::event::{
    Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use futures::StreamExt;
use ratatui::{backend::Backend, Terminal};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub struct App {
    cloud: CloudView,
    report: ReportPanel,
    tick_rate: Duration,
    should_quit: bool,
}

impl App {
    pub fn new(source: Arc<dyn KeywordSource>, config: &Config) -> Self {
        Self {
            cloud: CloudView::new(source.clone(), config),
            report: ReportPanel::new(source, ReportOptions::from(&config.report)),
            tick_rate: Duration::from_millis(config.ui.tick_rate_ms.max(1)),
            should_quit: false,
        }
    }

    pub fn cloud(&self) -> &CloudView {
        &self.cloud
    }

    pub fn report(&self) -> &ReportPanel {
        &self.report
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn mount(&mut self) {
        self.cloud.mount();
    }

    /// The host side of a keyword click: open its report.
    pub fn on_word_click(&mut self, keyword: String) {
        tracing::info!(%keyword, "keyword selected");
        self.report.select(keyword);
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            _ => {}
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('q')
            || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
        {
            self.should_quit = true;
            return;
        }

        if self.report.is_open() {
            match key.code {
                KeyCode::Esc => self.report.close(),
                KeyCode::Char('r') => {
                    if let Err(e) = self.report.retry() {
                        tracing::debug!(error = %e, "report retry ignored");
                    }
                }
                KeyCode::Char('j') | KeyCode::Down => self.report.scroll_down(),
                KeyCode::Char('k') | KeyCode::Up => self.report.scroll_up(),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Tab | KeyCode::Right | KeyCode::Down => self.cloud.focus_next(),
            KeyCode::BackTab | KeyCode::Left | KeyCode::Up => self.cloud.focus_prev(),
            KeyCode::Enter => {
                if let Some(keyword) = self.cloud.activate() {
                    self.on_word_click(keyword);
                }
            }
            KeyCode::Char('r') => {
                if let Err(e) = self.cloud.retry() {
                    tracing::debug!(error = %e, "dataset retry ignored");
                }
            }
            KeyCode::Char('R') => self.cloud.reload(),
            _ => {}
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.report.is_open() {
            return;
        }

        match mouse.kind {
            MouseEventKind::Moved => self.cloud.hover_at(mouse.column, mouse.row),
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(keyword) = self.cloud.click_at(mouse.column, mouse.row) {
                    self.on_word_click(keyword);
                }
            }
            _ => {}
        }
    }

    pub fn tick(&mut self, now: Instant) {
        self.cloud.tick(now);
    }

    pub fn draw<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        terminal.draw(|frame| {
            let areas = ui::screen_areas(frame.area());
            self.cloud.set_area(areas.cloud);
            ui::draw(frame, self, &areas);
        })?;
        Ok(())
    }

    pub async fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        self.mount();

        let mut events = EventStream::new();
        let mut ticker = tokio::time::interval(self.tick_rate);

        while !self.should_quit {
            self.draw(terminal)?;

            tokio::select! {
                Some(completion) = self.cloud.next_completion() => {
                    self.cloud.on_completion(completion);
                }
                Some(completion) = self.report.next_completion() => {
                    self.report.on_completion(completion);
                }
                event = events.next() => match event {
                    Some(Ok(event)) => self.handle_event(event),
                    Some(Err(e)) => return Err(e.into()),
                    None => self.should_quit = true,
                },
                _ = ticker.tick() => self.tick(Instant::now()),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::feeds::{KeywordRecord, ReportResult};
    use crate::ui::widgets::report::ReportView;
    use async_trait::async_trait;
    use chrono::Utc;
    use ratatui::backend::TestBackend;

    struct StaticSource;

    #[async_trait]
    impl KeywordSource for StaticSource {
        async fn fetch_dataset(&self) -> Result<Vec<KeywordRecord>, TransportError> {
            Ok(vec![
                KeywordRecord::new("AAPL", 500, 0.8),
                KeywordRecord::new("TSLA", 50, -0.3),
            ])
        }

        async fn fetch_report(
            &self,
            keyword: &str,
            options: &ReportOptions,
        ) -> Result<ReportResult, TransportError> {
            Ok(ReportResult {
                keyword: keyword.to_string(),
                report: format!("{keyword} over {}", options.period),
                generated_at: Utc::now(),
            })
        }
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    async fn loaded_app() -> (App, Terminal<TestBackend>) {
        let mut app = App::new(Arc::new(StaticSource), &Config::default());
        app.mount();
        let completion = app.cloud.next_completion().await.unwrap();
        app.cloud.on_completion(completion);

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        app.draw(&mut terminal).unwrap();
        (app, terminal)
    }

    #[tokio::test]
    async fn test_mouse_click_opens_report() {
        let (mut app, _terminal) = loaded_app().await;
        let glyph = app
            .cloud()
            .glyphs()
            .into_iter()
            .find(|g| g.text == "TSLA")
            .unwrap();

        app.handle_mouse(mouse(
            MouseEventKind::Down(MouseButton::Left),
            glyph.col,
            glyph.row,
        ));
        assert_eq!(app.report().selected(), Some("TSLA"));

        let completion = app.report.next_completion().await.unwrap();
        assert!(app.report.on_completion(completion));
        assert!(matches!(
            app.report().view(),
            ReportView::Ready(r) if r.report == "TSLA over 24h"
        ));
    }

    #[tokio::test]
    async fn test_keyboard_selects_and_escape_closes() {
        let (mut app, mut terminal) = loaded_app().await;
        app.handle_key(press(KeyCode::Tab));
        app.handle_key(press(KeyCode::Enter));
        assert_eq!(app.report().selected(), Some("AAPL"));
        app.draw(&mut terminal).unwrap();

        app.handle_key(press(KeyCode::Esc));
        assert!(!app.report().is_open());
        assert_eq!(app.report().view(), ReportView::Closed);
    }

    #[tokio::test]
    async fn test_cloud_ignores_pointer_while_report_open() {
        let (mut app, _terminal) = loaded_app().await;
        app.on_word_click("AAPL".to_string());
        let glyph = app.cloud().glyphs()[1].clone();

        app.handle_mouse(mouse(
            MouseEventKind::Down(MouseButton::Left),
            glyph.col,
            glyph.row,
        ));
        assert_eq!(app.report().selected(), Some("AAPL"));
    }

    #[tokio::test]
    async fn test_quit_keys() {
        let (mut app, _terminal) = loaded_app().await;
        app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(app.should_quit());
    }
}
