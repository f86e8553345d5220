//! A live preview: source text and theme selection in, published markup plus viewport out.
//!
//! The session owns the state the scheduler, override engine and viewport share and is the single
//! place where user actions are turned into reschedules, repaints or export requests. It performs no
//! I/O itself; the host drives it with [`PreviewSession::poll`] and hands finished compiles back via
//! [`PreviewSession::publish`].

use crate::config::PreviewSettings;
use crate::error::{ColorError, CompileError, ExportError};
use crate::export::{ExportReport, ExportRequest, PreviewSurface, SurfaceStyle};
use crate::grammar::DiagramGrammar;
use crate::overrides::{self, OverrideOutcome, OverrideRecord};
use crate::resolve::{MarkupNode, NodeMatch, NodeResolver};
use crate::schedule::{CompileJob, CycleOutcome, DiagramCompiler, RenderConfig, RenderResult, RenderScheduler};
use crate::theme::{BackgroundOverride, FontOverride, ThemeConfig};
use crate::viewport::ViewportController;
use std::time::Instant;

/// Actions the surrounding chrome (toolbar, menus) may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewCommand {
    ZoomIn,
    ZoomOut,
    ResetView,
    ClearOverrides,
    Export { transparent: bool },
}

/// What the preview currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreviewView {
    /// Last successfully published markup. Kept while a compile error is shown.
    pub markup: String,
    pub error: Option<CompileError>,
    /// Message from the last failed export, until dismissed.
    pub alert: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PreviewSession {
    settings: PreviewSettings,
    source: String,
    config: RenderConfig,
    scheduler: RenderScheduler,
    overrides: OverrideRecord,
    viewport: ViewportController,
    resolver: NodeResolver,
    view: PreviewView,
}

impl PreviewSession {
    pub fn new(theme: ThemeConfig, settings: PreviewSettings) -> Self {
        Self {
            scheduler: RenderScheduler::new(settings.debounce()),
            viewport: ViewportController::with_reset_scale(settings.reset_scale),
            settings,
            source: String::new(),
            config: RenderConfig::new(theme),
            overrides: OverrideRecord::new(),
            resolver: NodeResolver::new(),
            view: PreviewView::default(),
        }
    }

    pub fn with_resolver(mut self, resolver: NodeResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn settings(&self) -> &PreviewSettings {
        &self.settings
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn overrides(&self) -> &OverrideRecord {
        &self.overrides
    }

    pub fn viewport(&self) -> &ViewportController {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut ViewportController {
        &mut self.viewport
    }

    pub fn view(&self) -> &PreviewView {
        &self.view
    }

    /// A compile is running and there is nothing on screen yet. The debounce wait alone does not
    /// count.
    pub fn is_loading(&self) -> bool {
        self.scheduler.is_compiling() && self.view.markup.is_empty() && self.view.error.is_none()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn set_source(&mut self, source: impl Into<String>, now: Instant) {
        self.source = source.into();
        self.reschedule(now);
    }

    /// Switches theme. Overlay overrides are kept.
    pub fn set_theme(&mut self, theme: ThemeConfig, now: Instant) {
        self.config.theme = theme;
        self.reschedule(now);
    }

    pub fn set_background(&mut self, background: BackgroundOverride, now: Instant) {
        self.config.background = background;
        self.reschedule(now);
    }

    pub fn set_font(&mut self, font: FontOverride, now: Instant) {
        self.config.font = font;
        self.reschedule(now);
    }

    fn reschedule(&mut self, now: Instant) {
        self.scheduler.schedule(&self.source, &self.config, now);
    }

    pub fn poll(&mut self, now: Instant) -> Option<CompileJob> {
        self.scheduler.poll(now)
    }

    pub fn flush(&mut self) -> Option<CompileJob> {
        self.scheduler.flush()
    }

    /// Applies a finished compile. Returns `false` when it was superseded and ignored.
    pub fn publish(&mut self, outcome: CycleOutcome) -> bool {
        let Some(result) = self.scheduler.publish(outcome, &self.overrides) else {
            return false;
        };
        match result {
            RenderResult::Empty => {
                self.view.markup.clear();
                self.view.error = None;
            }
            RenderResult::Markup(markup) => {
                let pruned = self
                    .scheduler
                    .last_compiled_markup()
                    .map_or(0, |raw| self.overrides.retain_present(raw));
                self.view.markup = if pruned > 0 {
                    tracing::debug!(pruned, "dropped overrides for vanished elements");
                    self.scheduler.repaint(&self.overrides).unwrap_or(markup)
                } else {
                    markup
                };
                self.view.error = None;
            }
            RenderResult::Error(err) => {
                self.view.error = Some(err);
            }
        }
        true
    }

    /// Compiles whatever is pending right away. For hosts without an event loop.
    pub async fn render_now<C: DiagramCompiler>(&mut self, compiler: &C) -> bool {
        let Some(job) = self.flush() else {
            return false;
        };
        let outcome = job.run(compiler).await;
        self.publish(outcome)
    }

    pub fn resolve<N: MarkupNode>(&self, target: N, root: &N) -> Option<NodeMatch> {
        self.resolver.resolve(target, root)
    }

    /// Colors a resolved node. Flowcharts get their source rewritten and recompiled; other
    /// grammars are repainted from the last compile.
    pub fn apply_color(
        &mut self,
        node: &NodeMatch,
        fill: &str,
        now: Instant,
    ) -> Result<OverrideOutcome, ColorError> {
        let grammar = DiagramGrammar::detect(&self.source);
        let outcome = overrides::apply_color(grammar, node, fill, &self.source, &mut self.overrides)?;
        match &outcome {
            OverrideOutcome::SourceRewritten(source) => {
                self.source = source.clone();
                self.reschedule(now);
            }
            OverrideOutcome::OverlayUpdated => self.repaint(),
        }
        Ok(outcome)
    }

    /// Context-menu color pick on a pointer target. `Ok(None)` means the target was not a
    /// diagram element and nothing changed.
    pub fn pick_color<N: MarkupNode>(
        &mut self,
        target: N,
        root: &N,
        fill: &str,
        now: Instant,
    ) -> Result<Option<NodeMatch>, ColorError> {
        let Some(node) = self.resolve(target, root) else {
            return Ok(None);
        };
        self.apply_color(&node, fill, now)?;
        Ok(Some(node))
    }

    fn repaint(&mut self) {
        if let Some(markup) = self.scheduler.repaint(&self.overrides) {
            self.view.markup = markup;
        }
    }

    /// Runs a toolbar command. Export is returned to the caller as a request, since capture
    /// needs the host's surface, rasterizer and download sink.
    pub fn handle(&mut self, command: PreviewCommand) -> Option<ExportRequest> {
        match command {
            PreviewCommand::ZoomIn => self.viewport.zoom_in(),
            PreviewCommand::ZoomOut => self.viewport.zoom_out(),
            PreviewCommand::ResetView => self.viewport.reset(),
            PreviewCommand::ClearOverrides => {
                self.overrides.clear();
                self.repaint();
            }
            PreviewCommand::Export { transparent } => return Some(self.export_request(transparent)),
        }
        None
    }

    pub fn export_request(&self, transparent: bool) -> ExportRequest {
        ExportRequest {
            transparent,
            markup: self.view.markup.clone(),
            background: self.config.background_style(),
        }
    }

    pub fn record_export(&mut self, result: &Result<ExportReport, ExportError>) {
        self.view.alert = result.as_ref().err().map(|err| err.alert_text().to_string());
    }

    pub fn dismiss_alert(&mut self) {
        self.view.alert = None;
    }

    /// Pushes the shown markup and viewport transform onto `surface`.
    pub fn present<S: PreviewSurface>(&self, surface: &mut S) {
        surface.set_markup(&self.view.markup);
        surface.set_inline_style(SurfaceStyle::from(&self.viewport.transform_style()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::builtin_theme;
    use std::time::Duration;

    fn session() -> PreviewSession {
        PreviewSession::new(builtin_theme("notion").unwrap(), PreviewSettings::default())
    }

    #[test]
    fn toolbar_commands_drive_viewport() {
        let mut s = session();
        assert!(s.handle(PreviewCommand::ZoomIn).is_none());
        assert_eq!(s.viewport().zoom_percent(), 140);
        s.handle(PreviewCommand::ZoomOut);
        s.handle(PreviewCommand::ZoomOut);
        assert_eq!(s.viewport().zoom_percent(), 100);
        s.handle(PreviewCommand::ResetView);
        assert_eq!(s.viewport().zoom_percent(), 120);
    }

    #[test]
    fn loading_starts_with_the_compile_not_the_debounce() {
        let t0 = Instant::now();
        let mut s = session();
        assert!(!s.is_loading());
        s.set_source("graph TD\nA-->B", t0);
        assert!(!s.is_loading());
        assert_eq!(s.next_deadline(), Some(t0 + Duration::from_millis(600)));
        assert!(s.poll(t0 + Duration::from_millis(599)).is_none());
        assert!(!s.is_loading());
        assert!(s.poll(t0 + Duration::from_millis(600)).is_some());
        assert!(s.is_loading());
    }

    #[test]
    fn export_command_snapshots_published_state() {
        let mut s = session();
        let request = s.handle(PreviewCommand::Export { transparent: true }).unwrap();
        assert!(request.transparent);
        assert!(request.markup.is_empty());
        assert_eq!(request.background.class, "bg-white");
    }

    #[test]
    fn failed_export_raises_alert() {
        let mut s = session();
        s.record_export(&Err(ExportError::NothingToExport));
        assert_eq!(s.view().alert.as_deref(), Some("Nothing to export yet."));
        s.dismiss_alert();
        assert!(s.view().alert.is_none());
    }
}
