//! The analysis orchestrator: one engine per open document.
//!
//! `CheckEngine` ties the pieces together. A check request is validated,
//! stamped with a request id, debounced by the scheduler, served from cache
//! when possible, throttled per service, and finally dispatched. Any edit
//! advances the id, so results of in-flight requests are discarded on
//! arrival instead of overwriting newer state; the network call itself is
//! never cancelled, only its result.
//!
//! Locking discipline: session and cache state live behind `std::sync`
//! mutexes and no lock is ever held across an await.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use futures::StreamExt;
use futures::stream::{AbortHandle, Abortable};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use redpen_core::{
    ChangeRegion, CheckError, CheckOptions, CheckTrigger, Edit, OutcomeRecord, Suggestion,
};

use crate::cache::{CacheConfig, CacheStats, ResultCache};
use crate::change::{self, ChangeDetector};
use crate::ignore::IgnoreLearner;
use crate::limiter::{AdaptiveLimiter, Health, LimiterConfig};
use crate::merge;
use crate::scheduler::{SchedulerConfig, SmartScheduler};
use crate::service::{
    CheckRequest, GenerativeRequest, GenerativeService, GrammarService, RuleChecker, StreamFrame,
};

/// Engine-wide policy. Per-component configs nest here so a host constructs
/// everything from one value.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub options: CheckOptions,
    pub scheduler: SchedulerConfig,
    pub cache: CacheConfig,
    pub remote_limiter: LimiterConfig,
    pub generative_limiter: LimiterConfig,
    /// Inputs longer than this are rejected outright.
    pub max_text_len: usize,
    /// Chars of surrounding context carried when slicing incremental spans
    /// and when fingerprinting outcomes.
    pub context_window: usize,
    pub document_type: String,
    pub check_type: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            options: CheckOptions::default(),
            scheduler: SchedulerConfig::default(),
            cache: CacheConfig::default(),
            remote_limiter: LimiterConfig::default(),
            generative_limiter: LimiterConfig::default(),
            max_text_len: 100_000,
            context_window: 40,
            document_type: "general".into(),
            check_type: "comprehensive".into(),
        }
    }
}

/// What a completed check request amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// A newer request or an edit superseded this one; nothing was published.
    Stale,
    /// Served from the result cache without touching any service.
    CacheHit(usize),
    /// Fresh results published; the count is the published set size.
    Applied(usize),
    /// The primary service was unavailable; fallback results (possibly none)
    /// were published instead.
    Degraded { applied: usize, reason: CheckError },
}

/// Combined health of the remote services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineHealth {
    pub remote: Health,
    pub generative: Health,
}

/// Per-document mutable state. Single mutex: these pieces are read and
/// written together on every cycle.
struct Session {
    published: Vec<Suggestion>,
    detector: ChangeDetector,
    scheduler: SmartScheduler,
    learner: IgnoreLearner,
}

/// Orchestrates analysis for one document across three suggestion sources.
pub struct CheckEngine<G, N, R> {
    config: EngineConfig,
    grammar: G,
    generative: N,
    rules: R,
    cache: Mutex<ResultCache<Vec<Suggestion>>>,
    remote_limiter: AdaptiveLimiter,
    generative_limiter: AdaptiveLimiter,
    session: Mutex<Session>,
    /// Current request id; edits and newer requests advance it.
    seq: AtomicU64,
    /// Abort handle for the in-flight generative stream, tagged with the
    /// request id that owns it.
    stream_abort: Mutex<Option<(u64, AbortHandle)>>,
}

impl<G, N, R> CheckEngine<G, N, R>
where
    G: GrammarService,
    N: GenerativeService,
    R: RuleChecker,
{
    pub fn new(config: EngineConfig, grammar: G, generative: N, rules: R) -> Self {
        Self {
            cache: Mutex::new(ResultCache::new(config.cache.clone())),
            remote_limiter: AdaptiveLimiter::new(config.remote_limiter.clone()),
            generative_limiter: AdaptiveLimiter::new(config.generative_limiter.clone()),
            session: Mutex::new(Session {
                published: Vec::new(),
                detector: ChangeDetector::new(),
                scheduler: SmartScheduler::new(config.scheduler.clone()),
                learner: IgnoreLearner::new(),
            }),
            seq: AtomicU64::new(0),
            stream_abort: Mutex::new(None),
            config,
            grammar,
            generative,
            rules,
        }
    }

    /// Run one grammar/style check over `text`.
    ///
    /// Returns `Err` only for invalid input; service failures degrade to the
    /// rule-based fallback and are reported in the outcome.
    pub async fn request_check(
        &self,
        text: &str,
        trigger: CheckTrigger,
    ) -> Result<CheckOutcome, CheckError> {
        self.validate(text)?;
        let id = self.stamp();

        let delay = {
            let mut session = self.session.lock().unwrap();
            session.scheduler.sample_words(text.split_whitespace().count());
            session
                .scheduler
                .delay(trigger, text.chars().count(), session.published.len())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.is_stale(id) {
            return Ok(CheckOutcome::Stale);
        }

        if let Some(cached) = self.cache.lock().unwrap().get(text, &self.config.options) {
            return Ok(match self.publish_cached(id, text, cached) {
                Some(count) => CheckOutcome::CacheHit(count),
                None => CheckOutcome::Stale,
            });
        }

        let changed_ranges = self.changed_ranges(text);

        if let Err(err) = self.remote_limiter.throttle(priority(trigger)).await {
            return Ok(self.degrade(text, id, err));
        }
        if self.is_stale(id) {
            return Ok(CheckOutcome::Stale);
        }

        let request = CheckRequest {
            text: text.to_string(),
            language: self.config.options.language.clone(),
            changed_ranges: changed_ranges.clone(),
        };
        let started = Instant::now();
        match self.grammar.check(&request).await {
            Ok(response) => {
                self.remote_limiter.on_success(started.elapsed());
                let Some(count) =
                    self.publish(id, text, response.suggestions, changed_ranges.as_deref(), true)
                else {
                    debug!(id, "discarding stale grammar result");
                    return Ok(CheckOutcome::Stale);
                };
                info!(
                    suggestions = count,
                    incremental = changed_ranges.is_some(),
                    "grammar check applied"
                );
                Ok(CheckOutcome::Applied(count))
            }
            Err(err) => {
                self.remote_limiter.on_failure(err.is_server_side());
                warn!(error = %err, "grammar service failed, falling back to rules");
                Ok(self.degrade(text, id, err))
            }
        }
    }

    /// Run one generative check, consuming suggestions frame by frame so they
    /// publish progressively. A newer streaming request aborts the previous
    /// stream before opening its own.
    pub async fn request_streaming_check(
        &self,
        text: &str,
        trigger: CheckTrigger,
    ) -> Result<CheckOutcome, CheckError> {
        self.validate(text)?;
        let id = self.stamp();

        if let Some((owner, handle)) = self.stream_abort.lock().unwrap().take() {
            debug!(superseded = owner, by = id, "aborting in-flight stream");
            handle.abort();
        }

        let delay = {
            let mut session = self.session.lock().unwrap();
            session.scheduler.sample_words(text.split_whitespace().count());
            session
                .scheduler
                .delay(trigger, text.chars().count(), session.published.len())
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.is_stale(id) {
            return Ok(CheckOutcome::Stale);
        }

        if let Some(cached) = self.cache.lock().unwrap().get(text, &self.config.options) {
            return Ok(match self.publish_cached(id, text, cached) {
                Some(count) => CheckOutcome::CacheHit(count),
                None => CheckOutcome::Stale,
            });
        }

        if let Err(err) = self.generative_limiter.throttle(priority(trigger)).await {
            return Ok(self.degrade(text, id, err));
        }
        if self.is_stale(id) {
            return Ok(CheckOutcome::Stale);
        }

        let changed_ranges = self.changed_ranges(text);
        let request = GenerativeRequest {
            text: text.to_string(),
            document_type: self.config.document_type.clone(),
            check_type: self.config.check_type.clone(),
            style_profile: None,
            changed_ranges: changed_ranges.clone(),
        };

        let started = Instant::now();
        let stream = match self.generative.open_stream(&request).await {
            Ok(stream) => stream,
            Err(CheckError::StreamingUnsupported) => {
                return self.batch_generative(&request, text, id, started).await;
            }
            Err(err) => {
                self.generative_limiter.on_failure(err.is_server_side());
                return Ok(self.degrade(text, id, err));
            }
        };

        let (handle, registration) = AbortHandle::new_pair();
        *self.stream_abort.lock().unwrap() = Some((id, handle));
        let mut frames = Abortable::new(stream, registration);

        // A full-document run replaces the published set; incremental runs
        // merge into it per frame. Cleared under the same locked staleness
        // discipline as `publish` so a superseding request's state survives.
        if changed_ranges.is_none() {
            let mut session = self.session.lock().unwrap();
            if self.is_stale(id) {
                drop(session);
                self.clear_stream_handle(id);
                return Ok(CheckOutcome::Stale);
            }
            session.published.clear();
        }

        while let Some(frame) = frames.next().await {
            if self.is_stale(id) {
                self.clear_stream_handle(id);
                return Ok(CheckOutcome::Stale);
            }
            match frame {
                Ok(StreamFrame::Start) => {}
                Ok(StreamFrame::Suggestion { suggestion, running_count }) => {
                    let Some(published) =
                        self.publish(id, text, vec![suggestion], changed_ranges.as_deref(), false)
                    else {
                        self.clear_stream_handle(id);
                        return Ok(CheckOutcome::Stale);
                    };
                    debug!(running_count, published, "stream frame applied");
                }
                Ok(StreamFrame::Complete { stats }) => {
                    debug!(
                        suggestions = stats.suggestion_count,
                        model_time_ms = stats.model_time_ms,
                        "stream complete"
                    );
                    break;
                }
                Ok(StreamFrame::Error { message }) => {
                    self.clear_stream_handle(id);
                    self.generative_limiter.on_failure(true);
                    warn!(%message, "generative stream reported failure");
                    let reason = CheckError::ServerError { status: 500, body: message };
                    return Ok(self.degrade(text, id, reason));
                }
                Err(err) => {
                    self.clear_stream_handle(id);
                    self.generative_limiter.on_failure(err.is_server_side());
                    return Ok(self.degrade(text, id, err));
                }
            }
        }

        self.clear_stream_handle(id);
        if frames.is_aborted() || self.is_stale(id) {
            return Ok(CheckOutcome::Stale);
        }
        self.generative_limiter.on_success(started.elapsed());
        let Some(count) = self.finalize(id, text) else {
            return Ok(CheckOutcome::Stale);
        };
        info!(suggestions = count, "streaming check applied");
        Ok(CheckOutcome::Applied(count))
    }

    /// Apply a local edit: remap published offsets synchronously, feed the
    /// scheduler, and invalidate in-flight requests.
    pub fn apply_edit(&self, edit: &Edit) {
        let mut session = self.session.lock().unwrap();
        // Advanced under the session lock: publishers re-check the id while
        // holding it, so a result stamped before this edit can never land
        // after the remap.
        self.seq.fetch_add(1, Ordering::SeqCst);
        let published = std::mem::take(&mut session.published);
        session.published = merge::remap(published, edit);
        session.scheduler.record_edit(edit.kind(), edit.size());
    }

    /// Record the user accepting or dismissing a published suggestion.
    ///
    /// The suggestion leaves the published set either way; dismissals also
    /// feed the ignore learner. Returns the history record for persistence,
    /// or `None` if the id is not currently published.
    pub fn record_outcome(
        &self,
        suggestion_id: &str,
        accepted: bool,
        text: &str,
    ) -> Option<OutcomeRecord> {
        let mut session = self.session.lock().unwrap();
        let pos = session
            .published
            .iter()
            .position(|s| s.id == suggestion_id)?;
        let suggestion = session.published.remove(pos);
        let flagged = char_slice(text, suggestion.offset, suggestion.end());
        let context = char_slice(
            text,
            suggestion.offset.saturating_sub(self.config.context_window),
            suggestion.end() + self.config.context_window,
        );
        session
            .learner
            .record_outcome(&suggestion, accepted, &flagged, &context);
        Some(OutcomeRecord {
            kind: suggestion.kind,
            text: flagged,
            context,
            accepted,
            recorded_at: Utc::now(),
        })
    }

    /// Seed the ignore learner from persisted history.
    pub fn load_history(&self, records: &[OutcomeRecord]) {
        self.session.lock().unwrap().learner.load(records);
    }

    /// Snapshot of the currently published suggestions, offset-ordered.
    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.session.lock().unwrap().published.clone()
    }

    pub fn health(&self) -> EngineHealth {
        EngineHealth {
            remote: self.remote_limiter.health(),
            generative: self.generative_limiter.health(),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().unwrap().stats()
    }

    /// Forget all per-document state; used when a different document is
    /// loaded into the same engine.
    pub fn reset(&self) {
        let mut session = self.session.lock().unwrap();
        self.seq.fetch_add(1, Ordering::SeqCst);
        session.published.clear();
        session.detector.reset();
        drop(session);
        self.cache.lock().unwrap().clear();
    }

    // ── Internals ──────────────────────────────────────────────────────

    fn validate(&self, text: &str) -> Result<(), CheckError> {
        if text.trim().is_empty() {
            return Err(CheckError::InvalidInput("text is empty".into()));
        }
        let len = text.chars().count();
        if len > self.config.max_text_len {
            return Err(CheckError::InvalidInput(format!(
                "text is {len} chars, limit is {}",
                self.config.max_text_len
            )));
        }
        Ok(())
    }

    fn stamp(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_stale(&self, id: u64) -> bool {
        self.seq.load(Ordering::SeqCst) != id
    }

    /// Changed spans versus the last committed snapshot, widened to sentence
    /// boundaries. `None` means a full-document check is required.
    fn changed_ranges(&self, text: &str) -> Option<Vec<ChangeRegion>> {
        let session = self.session.lock().unwrap();
        if !session.detector.has_snapshot() {
            return None;
        }
        let regions = session.detector.diff(text);
        drop(session);

        let total = text.chars().count();
        let expanded: Vec<ChangeRegion> = regions
            .into_iter()
            .map(|r| {
                let (start, end) =
                    change::expand_to_sentence(text, r.start, r.end, self.config.context_window);
                ChangeRegion { start, end, paragraph_index: r.paragraph_index }
            })
            .collect();
        // A region that swallowed the whole document is a full check.
        if expanded.iter().any(|r| r.start == 0 && r.end >= total) {
            return None;
        }
        Some(expanded)
    }

    /// Filter through the learner, merge into the published set, and commit
    /// on authoritative results. Returns the published set size.
    ///
    /// Staleness is re-checked while the session lock is held; an edit
    /// cannot slip in between a caller's own check and the write. A stale id
    /// publishes nothing and returns `None`.
    fn publish(
        &self,
        id: u64,
        text: &str,
        incoming: Vec<Suggestion>,
        changed_ranges: Option<&[ChangeRegion]>,
        authoritative: bool,
    ) -> Option<usize> {
        let mut session = self.session.lock().unwrap();
        if self.is_stale(id) {
            return None;
        }
        let filtered = session.learner.filter(incoming, text);
        let existing = if authoritative && changed_ranges.is_none() {
            // A fresh full result replaces everything.
            Vec::new()
        } else {
            std::mem::take(&mut session.published)
        };
        let merged = merge::merge(existing, filtered, changed_ranges);
        let count = merged.len();
        session.published = merged.clone();
        if authoritative {
            session.detector.commit(text);
        }
        drop(session);
        if authoritative {
            self.cache
                .lock()
                .unwrap()
                .set(text, &self.config.options, merged);
        }
        Some(count)
    }

    /// Serve a cached result. Same locked staleness discipline as `publish`.
    fn publish_cached(&self, id: u64, text: &str, cached: Vec<Suggestion>) -> Option<usize> {
        let mut session = self.session.lock().unwrap();
        if self.is_stale(id) {
            return None;
        }
        // Re-filter: the learner may have picked up dismissals since the
        // entry was stored.
        let filtered = session.learner.filter(cached, text);
        let count = filtered.len();
        session.published = filtered;
        session.detector.commit(text);
        debug!(suggestions = count, "served from cache");
        Some(count)
    }

    /// Commit and cache the published set at the end of a streaming run.
    fn finalize(&self, id: u64, text: &str) -> Option<usize> {
        let mut session = self.session.lock().unwrap();
        if self.is_stale(id) {
            return None;
        }
        session.detector.commit(text);
        let published = session.published.clone();
        drop(session);
        let count = published.len();
        self.cache
            .lock()
            .unwrap()
            .set(text, &self.config.options, published);
        Some(count)
    }

    /// Rule-based fallback when a service is unreachable. The confidence bar
    /// drops so the local checker can still surface something useful; the
    /// result is neither cached nor snapshot-committed, so the next healthy
    /// cycle re-checks in full.
    fn degrade(&self, text: &str, id: u64, reason: CheckError) -> CheckOutcome {
        if self.is_stale(id) {
            return CheckOutcome::Stale;
        }
        let mut options = self.config.options.clone();
        options.min_confidence = options.min_confidence.saturating_sub(20);
        let suggestions = self.rules.check(text, &options);
        match self.publish(id, text, suggestions, None, false) {
            Some(applied) => {
                info!(applied, reason = %reason, "degraded to rule-based results");
                CheckOutcome::Degraded { applied, reason }
            }
            None => CheckOutcome::Stale,
        }
    }

    async fn batch_generative(
        &self,
        request: &GenerativeRequest,
        text: &str,
        id: u64,
        started: Instant,
    ) -> Result<CheckOutcome, CheckError> {
        match self.generative.check(request).await {
            Ok(response) if response.success => {
                self.generative_limiter.on_success(started.elapsed());
                let Some(count) = self.publish(
                    id,
                    text,
                    response.suggestions,
                    request.changed_ranges.as_deref(),
                    true,
                ) else {
                    return Ok(CheckOutcome::Stale);
                };
                Ok(CheckOutcome::Applied(count))
            }
            Ok(_) => {
                self.generative_limiter.on_failure(true);
                let reason = CheckError::ServerError {
                    status: 500,
                    body: "generative service reported failure".into(),
                };
                Ok(self.degrade(text, id, reason))
            }
            Err(err) => {
                self.generative_limiter.on_failure(err.is_server_side());
                Ok(self.degrade(text, id, err))
            }
        }
    }

    fn clear_stream_handle(&self, id: u64) {
        let mut guard = self.stream_abort.lock().unwrap();
        if guard.as_ref().is_some_and(|(owner, _)| *owner == id) {
            *guard = None;
        }
    }
}

fn priority(trigger: CheckTrigger) -> u8 {
    match trigger {
        CheckTrigger::Blur => 9,
        CheckTrigger::SentenceEnd | CheckTrigger::ParagraphEnd => 5,
        CheckTrigger::Pause => 4,
        CheckTrigger::Typing => 2,
    }
}

/// Char-indexed slice clamped to the document bounds.
fn char_slice(text: &str, start: usize, end: usize) -> String {
    text.chars()
        .skip(start)
        .take(end.saturating_sub(start))
        .collect()
}
