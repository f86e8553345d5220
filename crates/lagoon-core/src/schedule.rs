//! Debounced, generation-checked compile cycles.
//!
//! The scheduler never blocks and never owns a clock: callers pass `now` in, pull a
//! [`CompileJob`] out once its deadline elapses, run it against a [`DiagramCompiler`] without
//! holding the scheduler, and hand the outcome back to [`RenderScheduler::publish`]. Only the most
//! recently scheduled cycle may publish; anything older is dropped on arrival.

use crate::config::CompilerOptions;
use crate::error::{CompileError, CompileFailure};
use crate::grammar::DiagramGrammar;
use crate::overrides::OverrideRecord;
use crate::postprocess::{PostProcessContext, post_process};
use crate::theme::{BackgroundOverride, BackgroundStyle, FontOverride, ThemeConfig};
use std::future::Future;
use std::time::{Duration, Instant};

/// Compiles diagram source into markup. Implementations run on whatever executor the host uses.
pub trait DiagramCompiler {
    /// `render_id` is unique per cycle; compilers typically use it as the root element id.
    fn compile(
        &self,
        render_id: &str,
        source: &str,
        options: &CompilerOptions,
    ) -> impl Future<Output = Result<String, CompileFailure>>;
}

impl<T: DiagramCompiler + ?Sized> DiagramCompiler for &T {
    fn compile(
        &self,
        render_id: &str,
        source: &str,
        options: &CompilerOptions,
    ) -> impl Future<Output = Result<String, CompileFailure>> {
        (**self).compile(render_id, source, options)
    }
}

/// Theme plus overrides captured when a cycle is scheduled.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub theme: ThemeConfig,
    pub background: BackgroundOverride,
    pub font: FontOverride,
}

impl RenderConfig {
    pub fn new(theme: ThemeConfig) -> Self {
        Self {
            theme,
            background: BackgroundOverride::Default,
            font: FontOverride::Default,
        }
    }

    pub fn compiler_options(&self) -> CompilerOptions {
        self.theme.effective_compiler_options(&self.font)
    }

    pub fn background_style(&self) -> BackgroundStyle {
        self.background.resolve(&self.theme)
    }
}

/// What a cycle publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderResult {
    /// The source was empty; the surface should be cleared.
    Empty,
    /// Post-processed markup.
    Markup(String),
    Error(CompileError),
}

#[derive(Debug, Clone)]
struct PendingCycle {
    cycle: u64,
    source: String,
    config: RenderConfig,
    due: Instant,
}

/// A cycle whose debounce window has elapsed and which is ready to compile.
#[derive(Debug, Clone)]
pub struct CompileJob {
    pub cycle: u64,
    pub render_id: String,
    pub source: String,
    pub config: RenderConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compiled {
    Empty,
    Markup(String),
    Failed(CompileFailure),
}

/// Result of running a [`CompileJob`], to be handed back to [`RenderScheduler::publish`].
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub cycle: u64,
    pub grammar: DiagramGrammar,
    pub config: RenderConfig,
    pub compiled: Compiled,
}

impl CompileJob {
    pub async fn run<C: DiagramCompiler>(self, compiler: &C) -> CycleOutcome {
        let grammar = DiagramGrammar::detect(&self.source);
        let compiled = if self.source.trim().is_empty() {
            Compiled::Empty
        } else {
            let options = self.config.compiler_options();
            match compiler.compile(&self.render_id, &self.source, &options).await {
                Ok(markup) => Compiled::Markup(markup),
                Err(err) => Compiled::Failed(err),
            }
        };
        CycleOutcome {
            cycle: self.cycle,
            grammar,
            config: self.config,
            compiled,
        }
    }
}

/// Raw compiler output of the last successful cycle, kept so overlay edits can be repainted
/// without recompiling.
#[derive(Debug, Clone)]
struct CompiledMarkup {
    markup: String,
    grammar: DiagramGrammar,
    config: RenderConfig,
}

impl CompiledMarkup {
    fn render(&self, overrides: &OverrideRecord) -> String {
        let background = self.config.background_style();
        let ctx = PostProcessContext {
            grammar: self.grammar,
            theme: &self.config.theme,
            background: &background,
            font: &self.config.font,
        };
        post_process(&self.markup, &ctx, overrides)
    }
}

#[derive(Debug, Clone)]
pub struct RenderScheduler {
    delay: Duration,
    latest: u64,
    pending: Option<PendingCycle>,
    in_flight: Option<u64>,
    last_compiled: Option<CompiledMarkup>,
}

pub fn new_render_id() -> String {
    format!("lagoon-{}", uuid::Uuid::new_v4().simple())
}

impl RenderScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            latest: 0,
            pending: None,
            in_flight: None,
            last_compiled: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Generation of the most recently scheduled cycle (0 before the first).
    pub fn latest_cycle(&self) -> u64 {
        self.latest
    }

    /// Records a change and (re)starts the debounce window. Any pending or in-flight cycle is
    /// superseded.
    pub fn schedule(&mut self, source: &str, config: &RenderConfig, now: Instant) -> u64 {
        self.latest += 1;
        if let Some(previous) = &self.pending {
            tracing::trace!(superseded = previous.cycle, cycle = self.latest, "debounce restarted");
        }
        self.pending = Some(PendingCycle {
            cycle: self.latest,
            source: source.to_string(),
            config: config.clone(),
            due: now + self.delay,
        });
        self.latest
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.due)
    }

    /// Whether a cycle is waiting on its deadline or on the compiler.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some() || self.in_flight.is_some()
    }

    /// Whether a started cycle has not been published yet.
    pub fn is_compiling(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Takes the pending cycle once its deadline has passed.
    pub fn poll(&mut self, now: Instant) -> Option<CompileJob> {
        if self.pending.as_ref().is_some_and(|p| p.due <= now) {
            return self.start_pending();
        }
        None
    }

    /// Takes the pending cycle immediately, ignoring its deadline.
    pub fn flush(&mut self) -> Option<CompileJob> {
        self.start_pending()
    }

    fn start_pending(&mut self) -> Option<CompileJob> {
        let pending = self.pending.take()?;
        self.in_flight = Some(pending.cycle);
        let render_id = new_render_id();
        tracing::debug!(cycle = pending.cycle, %render_id, "starting compile cycle");
        Some(CompileJob {
            cycle: pending.cycle,
            render_id,
            source: pending.source,
            config: pending.config,
        })
    }

    pub fn is_current(&self, cycle: u64) -> bool {
        cycle == self.latest
    }

    /// Publishes a finished cycle. Returns `None` when a newer cycle has been scheduled since this
    /// one started.
    pub fn publish(&mut self, outcome: CycleOutcome, overrides: &OverrideRecord) -> Option<RenderResult> {
        if self.in_flight == Some(outcome.cycle) {
            self.in_flight = None;
        }
        if !self.is_current(outcome.cycle) {
            tracing::debug!(cycle = outcome.cycle, latest = self.latest, "discarding stale compile result");
            return None;
        }

        let result = match outcome.compiled {
            Compiled::Empty => {
                self.last_compiled = None;
                RenderResult::Empty
            }
            Compiled::Markup(markup) => {
                let compiled = CompiledMarkup {
                    markup,
                    grammar: outcome.grammar,
                    config: outcome.config,
                };
                let rendered = compiled.render(overrides);
                self.last_compiled = Some(compiled);
                RenderResult::Markup(rendered)
            }
            Compiled::Failed(failure) => {
                tracing::warn!(cycle = outcome.cycle, error = %failure, "diagram compile failed");
                RenderResult::Error(failure.into())
            }
        };
        Some(result)
    }

    /// Re-runs post-processing over the last successful compile with the current overrides.
    pub fn repaint(&self, overrides: &OverrideRecord) -> Option<String> {
        self.last_compiled.as_ref().map(|c| c.render(overrides))
    }

    /// Raw compiler output of the last successful cycle, before any post-processing.
    pub fn last_compiled_markup(&self) -> Option<&str> {
        self.last_compiled.as_ref().map(|c| c.markup.as_str())
    }
}
