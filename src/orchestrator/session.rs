//! 会话控制器 - 编排层
//!
//! ## 职责
//!
//! 持有一次答题会话的全部状态，把用户操作和后台定时任务串起来：
//!
//! 1. **轮询**：眼镜同步来源按固定间隔拉取新照片，交给 `AcquisitionWindow` 判断何时派发
//! 2. **点击计数**：`TapExpectationCounter` 的每秒倒计时
//! 3. **批次处理**：派发的照片交给 `SequentialProcessor`，结果替换朗读队列
//! 4. **朗读**：按固定间隔逐条朗读，支持暂停、继续、重新开始
//!
//! ## 并发约定
//!
//! - 所有状态在同一把 `tokio::sync::Mutex` 之后
//! - 调用外部能力（加载图片、解题、拉取照片、朗读等待）时不持有锁
//! - 每个会话有一个 generation，结束 / 重新开始会话时递增并中止后台任务；
//!   后台任务写状态前先核对 generation，过期的结果直接丢弃
//! - 状态变化通过 broadcast 推送 `SessionSnapshot`，也可以用 `current_state()` 主动拉取

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AppResult, PhotoError, SessionError};
use crate::infrastructure::{PhotoLibrary, Speaker};
use crate::models::{AnswerItem, AssetRef, Image, PhotoSource, ProcessedSet, Session, SessionSnapshot};
use crate::orchestrator::batch_processor::{BatchReport, SequentialProcessor};
use crate::services::SolveService;
use crate::utils::logging::{append_answer_log, log_session_summary};
use crate::workflow::{
    AcquisitionDecision, AcquisitionWindow, AdvanceOutcome, BatchItem, ImageFlow, ReadoutQueue,
    ReadoutState, TapExpectationCounter, TapStatus, ToggleOutcome,
};

const EVENT_CAPACITY: usize = 64;

/// 会话运行参数
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub poll_interval: Duration,
    pub settle: Duration,
    pub max_photos: usize,
    pub tap_window: Duration,
    pub speech_pacing: Duration,
    pub auto_read_after_processing: bool,
    /// 答案记录文件，为 None 时不记录
    pub answer_log: Option<String>,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            settle: config.settle_duration(),
            max_photos: config.max_photos,
            tap_window: config.tap_window(),
            speech_pacing: config.speech_pacing(),
            auto_read_after_processing: config.auto_read_after_processing,
            answer_log: Some(config.output_log_file.clone()),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            answer_log: None,
            ..Self::from_config(&Config::default())
        }
    }
}

struct SessionInner {
    generation: u64,
    session: Option<Session>,
    processed: ProcessedSet,
    taps: TapExpectationCounter,
    window: AcquisitionWindow,
    /// 直接拍摄、尚未处理的图片
    captures: Vec<Image>,
    readout: ReadoutQueue,
    processing: bool,
    batches: usize,
    status_text: String,
    poll_task: Option<JoinHandle<()>>,
    tap_task: Option<JoinHandle<()>>,
    batch_task: Option<JoinHandle<()>>,
    readout_task: Option<JoinHandle<()>>,
}

impl SessionInner {
    fn new(settings: &SessionSettings) -> Self {
        Self {
            generation: 0,
            session: None,
            processed: ProcessedSet::new(),
            taps: TapExpectationCounter::new(settings.max_photos, settings.tap_window),
            window: AcquisitionWindow::new(settings.settle, settings.max_photos),
            captures: Vec::new(),
            readout: ReadoutQueue::new(),
            processing: false,
            batches: 0,
            status_text: "Ready".to_string(),
            poll_task: None,
            tap_task: None,
            batch_task: None,
            readout_task: None,
        }
    }

    /// 中止所有后台任务，关闭点击窗口（预计数量保留）
    fn abort_session_tasks(&mut self) {
        self.taps.close();
        for handle in [
            self.poll_task.take(),
            self.tap_task.take(),
            self.batch_task.take(),
            self.readout_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            handle.abort();
        }
    }

    fn abort_readout(&mut self) {
        if let Some(handle) = self.readout_task.take() {
            handle.abort();
        }
    }

    fn is_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_active)
    }

    fn require_source(&self, source: PhotoSource, operation: &str) -> Result<(), SessionError> {
        match &self.session {
            Some(session) if session.is_active && session.source == source => Ok(()),
            Some(session) if session.is_active => Err(SessionError::WrongSource {
                operation: operation.to_string(),
            }),
            _ => Err(SessionError::NoActiveSession),
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.session.clone(),
            expected_count: self.taps.expected(),
            tap_seconds_left: self.taps.seconds_left(Instant::now()),
            held_captures: self.captures.len(),
            processed_count: self.processed.len(),
            processing: self.processing,
            answers_total: self.readout.len(),
            readout_state: self.readout.state(),
            readout_index: self.readout.index(),
            status_text: self.status_text.clone(),
        }
    }
}

struct Shared {
    inner: Mutex<SessionInner>,
    events: broadcast::Sender<SessionSnapshot>,
    library: Option<Arc<dyn PhotoLibrary>>,
    speaker: Arc<dyn Speaker>,
    processor: SequentialProcessor,
    settings: SessionSettings,
}

/// 会话控制器
///
/// 可以随意 clone，所有 clone 共享同一个会话。
#[derive(Clone)]
pub struct SessionController {
    shared: Arc<Shared>,
}

impl SessionController {
    /// 创建控制器
    ///
    /// # 参数
    /// - `solver`: 解题服务
    /// - `library`: 照片库，眼镜同步来源必需
    /// - `speaker`: 朗读引擎
    /// - `settings`: 运行参数
    pub fn new(
        solver: Arc<SolveService>,
        library: Option<Arc<dyn PhotoLibrary>>,
        speaker: Arc<dyn Speaker>,
        settings: SessionSettings,
    ) -> Self {
        let mut flow = ImageFlow::new(solver);
        if let Some(library) = &library {
            flow = flow.with_library(library.clone());
        }
        let processor = SequentialProcessor::new(flow, settings.max_photos);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(SessionInner::new(&settings)),
                events,
                library,
                speaker,
                processor,
                settings,
            }),
        }
    }

    /// 订阅状态快照
    pub fn subscribe(&self) -> broadcast::Receiver<SessionSnapshot> {
        self.shared.events.subscribe()
    }

    /// 当前状态快照
    pub async fn current_state(&self) -> SessionSnapshot {
        self.shared.inner.lock().await.snapshot()
    }

    /// 当前朗读队列中的全部答案
    pub async fn answers(&self) -> Vec<AnswerItem> {
        self.shared.inner.lock().await.readout.items().to_vec()
    }

    // ========== 会话 ==========

    /// 开始新会话，已有会话会被直接替换
    pub async fn start_session(&self, source: PhotoSource) -> AppResult<()> {
        if source == PhotoSource::GlassesSync && self.shared.library.is_none() {
            return Err(SessionError::WrongSource {
                operation: "眼镜同步需要照片库".to_string(),
            }
            .into());
        }

        let mut inner = self.shared.inner.lock().await;
        inner.abort_session_tasks();
        self.shared.speaker.stop();

        inner.generation += 1;
        let generation = inner.generation;

        let session = Session::start(source);
        let since = session.started_at;
        inner.session = Some(session);
        inner.processed.clear();
        inner.window = AcquisitionWindow::new(self.shared.settings.settle, self.shared.settings.max_photos);
        inner.captures.clear();
        inner.readout = ReadoutQueue::new();
        inner.processing = false;
        inner.batches = 0;

        info!("▶️ 会话开始 ({})", source);

        match source {
            PhotoSource::GlassesSync => {
                inner.poll_task = Some(self.spawn_poll(generation, since));
                inner.status_text = "Session started, waiting for photos from the glasses".to_string();
            }
            PhotoSource::DirectCapture => {
                inner.status_text = "Session started, take photos to begin".to_string();
            }
        }

        self.publish(&inner);
        Ok(())
    }

    /// 结束会话：停止轮询、处理和朗读，晚到的结果全部丢弃
    pub async fn end_session(&self) -> AppResult<()> {
        let mut inner = self.shared.inner.lock().await;
        if !inner.is_active() {
            return Err(SessionError::NoActiveSession.into());
        }

        inner.abort_session_tasks();
        self.shared.speaker.stop();
        inner.generation += 1;

        if let Some(session) = inner.session.as_mut() {
            session.is_active = false;
        }
        inner.readout.stop();
        inner.captures.clear();
        inner.processing = false;
        inner.window.reset();
        inner.window.finish_dispatch();
        inner.status_text = "Session ended".to_string();

        info!("⏹️ 会话结束");
        log_session_summary(
            inner.batches,
            inner.processed.len(),
            self.shared.settings.answer_log.as_deref().unwrap_or("-"),
        );

        self.publish(&inner);
        Ok(())
    }

    /// 停止所有后台任务（程序退出时使用）
    pub async fn shutdown(&self) {
        let mut inner = self.shared.inner.lock().await;
        inner.abort_session_tasks();
        inner.generation += 1;
        self.shared.speaker.stop();
    }

    // ========== 点击计数 ==========

    /// 点击一次，预计数量 +1，返回当前预计数量
    pub async fn tap_expected(&self) -> usize {
        let mut inner = self.shared.inner.lock().await;
        let status = inner.taps.tap(Instant::now());
        info!("👆 点击计数: {}", status.count());

        if !inner.processing {
            inner.status_text = status.status_text();
        }

        let running = inner.tap_task.as_ref().is_some_and(|h| !h.is_finished());
        if !running {
            let this = self.clone();
            inner.tap_task = Some(tokio::spawn(async move { this.tap_tick_loop().await }));
        }

        self.publish(&inner);
        status.count()
    }

    /// 预计数量清零
    pub async fn reset_expected(&self) {
        let mut inner = self.shared.inner.lock().await;
        inner.taps.reset();
        if let Some(handle) = inner.tap_task.take() {
            handle.abort();
        }
        info!("🔄 预计数量已清零");
        if !inner.processing {
            inner.status_text = "Expected count cleared".to_string();
        }
        self.publish(&inner);
    }

    async fn tap_tick_loop(&self) {
        loop {
            let next = {
                let mut inner = self.shared.inner.lock().await;
                match inner.taps.next_tick(Instant::now()) {
                    Some(next) => next,
                    None => {
                        inner.tap_task = None;
                        return;
                    }
                }
            };
            time::sleep_until(next).await;

            let mut inner = self.shared.inner.lock().await;
            let status = inner.taps.tick(Instant::now());
            if !inner.processing {
                inner.status_text = status.status_text();
            }

            if let TapStatus::Closed { count } = status {
                info!("点击窗口关闭，预计 {} 张照片", count);
                inner.tap_task = None;
                self.publish(&inner);
                return;
            }
            self.publish(&inner);
        }
    }

    // ========== 直接拍摄 ==========

    /// 保存一张直接拍摄的图片，返回当前暂存数量
    pub async fn add_captured_image(&self, image: Image) -> AppResult<usize> {
        let mut inner = self.shared.inner.lock().await;
        inner.require_source(PhotoSource::DirectCapture, "add_captured_image")?;

        let max = self.shared.settings.max_photos;
        if inner.captures.len() >= max {
            warn!("⚠️ 已达到照片上限 ({} 张)，忽略: {}", max, image.id);
            inner.status_text = format!("Photo limit reached ({})", max);
            self.publish(&inner);
            return Err(SessionError::CaptureLimitReached { max }.into());
        }

        debug!("暂存拍摄图片: {}", image.id);
        inner.captures.push(image);
        let held = inner.captures.len();
        inner.status_text = format!("{} photo{} captured", held, plural(held));

        self.publish(&inner);
        Ok(held)
    }

    /// 处理所有暂存的拍摄图片
    pub async fn process_captured_batch(&self, auto_start_reading: bool) -> AppResult<()> {
        let mut inner = self.shared.inner.lock().await;
        inner.require_source(PhotoSource::DirectCapture, "process_captured_batch")?;

        if inner.processing {
            info!("上一批仍在处理，忽略本次请求");
            return Ok(());
        }

        self.dispatch_captures(&mut inner, auto_start_reading);
        self.publish(&inner);
        Ok(())
    }

    fn dispatch_captures(&self, inner: &mut SessionInner, auto_start: bool) {
        let captures = std::mem::take(&mut inner.captures);
        let mut items = Vec::with_capacity(captures.len());
        for image in captures {
            if inner.processed.insert(image.id.clone()) {
                items.push(BatchItem::Captured(image));
            } else {
                debug!("图片 {} 已处理过，跳过", image.id);
            }
        }

        if items.is_empty() {
            inner.status_text = "No photos to process".to_string();
            return;
        }

        inner.status_text = processing_text(items.len());
        self.start_batch(inner, items, auto_start, PhotoSource::DirectCapture);
    }

    // ========== 轮询 ==========

    fn spawn_poll(&self, generation: u64, since: DateTime<Utc>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.poll_loop(generation, since).await })
    }

    async fn poll_loop(&self, generation: u64, since: DateTime<Utc>) {
        let Some(library) = self.shared.library.clone() else {
            return;
        };

        let mut ticker = time::interval(self.shared.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            {
                let inner = self.shared.inner.lock().await;
                if inner.generation != generation {
                    return;
                }
                if inner.window.is_dispatching() {
                    debug!("上一批仍在处理，跳过本次轮询");
                    continue;
                }
            }

            let fetched = library.fetch_new_assets(since).await;

            let mut inner = self.shared.inner.lock().await;
            if inner.generation != generation {
                return;
            }

            match fetched {
                Ok(assets) => self.handle_poll(&mut inner, assets),
                Err(PhotoError::PermissionDenied { path }) => {
                    error!("❌ 没有照片访问权限，停止轮询: {}", path);
                    inner.status_text =
                        "Photo access denied. Allow access to the photo folder, then start a new session."
                            .to_string();
                    inner.poll_task = None;
                    self.publish(&inner);
                    return;
                }
                Err(e) => {
                    warn!("⚠️ 获取新照片失败，下次轮询重试: {}", e);
                    inner.status_text = "Could not read new photos, retrying".to_string();
                    self.publish(&inner);
                }
            }
        }
    }

    fn handle_poll(&self, inner: &mut SessionInner, assets: Vec<AssetRef>) {
        let unprocessed: Vec<AssetRef> = inner
            .processed
            .unprocessed(&assets)
            .into_iter()
            .cloned()
            .collect();

        let decision = inner
            .window
            .observe(unprocessed.len(), inner.taps.expected(), Instant::now());

        match decision {
            AcquisitionDecision::Idle | AcquisitionDecision::Busy => return,
            AcquisitionDecision::Waiting {
                found,
                seconds_left,
            } => {
                info!("📷 发现 {} 张新照片，最多再等 {}s", found, seconds_left);
            }
            AcquisitionDecision::Dispatch { count } => {
                let mut items = Vec::with_capacity(count);
                for asset in unprocessed.into_iter().take(count) {
                    inner.processed.insert(asset.id.clone());
                    items.push(BatchItem::Asset(asset));
                }
                let auto_start = self.shared.settings.auto_read_after_processing;
                self.start_batch(inner, items, auto_start, PhotoSource::GlassesSync);
            }
        }

        if let Some(text) = decision.status_text() {
            inner.status_text = text;
        }
        self.publish(inner);
    }

    // ========== 批次处理 ==========

    fn start_batch(
        &self,
        inner: &mut SessionInner,
        items: Vec<BatchItem>,
        auto_start: bool,
        source: PhotoSource,
    ) {
        inner.processing = true;
        inner.batches += 1;

        let generation = inner.generation;
        let batch_num = inner.batches;
        let this = self.clone();
        inner.batch_task = Some(tokio::spawn(async move {
            this.run_batch(generation, batch_num, items, auto_start, source)
                .await
        }));
    }

    async fn run_batch(
        &self,
        generation: u64,
        batch_num: usize,
        items: Vec<BatchItem>,
        auto_start: bool,
        source: PhotoSource,
    ) {
        let report = self
            .shared
            .processor
            .process(items, batch_num, &source.to_string())
            .await;

        let mut inner = self.shared.inner.lock().await;
        if inner.generation != generation {
            debug!("批次 {} 完成时会话已结束，丢弃结果", batch_num);
            return;
        }

        inner.processing = false;
        inner.batch_task = None;
        inner.window.finish_dispatch();
        self.apply_report(&mut inner, report, auto_start);
        self.publish(&inner);
    }

    /// 新答案替换朗读队列；没有答案时保留原队列
    fn apply_report(&self, inner: &mut SessionInner, report: BatchReport, auto_start: bool) {
        inner.status_text = report.status_text();

        if report.answers.is_empty() {
            info!("批次 {} 没有可朗读的答案", report.batch_num);
            return;
        }

        if let Some(path) = &self.shared.settings.answer_log {
            if let Err(e) = append_answer_log(path, report.batch_num, &report.answers) {
                warn!("⚠️ 写入答案记录失败: {}", e);
            }
        }

        if inner.readout.state() == ReadoutState::Reading {
            self.shared.speaker.stop();
        }
        inner.abort_readout();
        inner.readout.replace(report.answers);

        if auto_start {
            if let ToggleOutcome::Started { epoch } = inner.readout.toggle() {
                info!("▶️ 自动开始朗读");
                self.spawn_readout(inner, epoch);
            }
        }
    }

    // ========== 朗读 ==========

    /// 朗读 ↔ 暂停；没有答案但有暂存的拍摄图片时先处理图片
    pub async fn toggle_reading(&self) {
        let mut inner = self.shared.inner.lock().await;

        let captures_pending = inner.readout.is_empty()
            && !inner.captures.is_empty()
            && !inner.processing
            && inner
                .require_source(PhotoSource::DirectCapture, "toggle_reading")
                .is_ok();
        if captures_pending {
            info!("还没有答案，先处理已拍摄的照片");
            self.dispatch_captures(&mut inner, true);
            self.publish(&inner);
            return;
        }

        match inner.readout.toggle() {
            ToggleOutcome::Paused => {
                inner.abort_readout();
                self.shared.speaker.stop();
                info!("⏸️ 暂停朗读");
                inner.status_text = format!(
                    "Paused at answer {} of {}",
                    inner.readout.index() + 1,
                    inner.readout.len()
                );
            }
            ToggleOutcome::Started { epoch } => {
                info!("▶️ 开始朗读 (第 {} 条)", inner.readout.index() + 1);
                self.spawn_readout(&mut inner, epoch);
            }
            ToggleOutcome::Empty => {
                inner.status_text = "Nothing to read yet".to_string();
            }
        }

        self.publish(&inner);
    }

    /// 从第一条重新朗读
    pub async fn restart_reading(&self) {
        let mut inner = self.shared.inner.lock().await;
        self.shared.speaker.stop();
        inner.abort_readout();

        match inner.readout.restart() {
            Some(epoch) => {
                info!("⏮️ 从头朗读");
                self.spawn_readout(&mut inner, epoch);
            }
            None => inner.status_text = "Nothing to read yet".to_string(),
        }

        self.publish(&inner);
    }

    fn spawn_readout(&self, inner: &mut SessionInner, epoch: u64) {
        inner.abort_readout();
        let generation = inner.generation;
        let this = self.clone();
        inner.readout_task = Some(tokio::spawn(async move {
            this.readout_loop(generation, epoch).await
        }));
    }

    async fn readout_loop(&self, generation: u64, epoch: u64) {
        loop {
            let index = {
                let mut inner = self.shared.inner.lock().await;
                if inner.generation != generation {
                    return;
                }

                let total = inner.readout.len();
                let Some((index, item)) = inner.readout.current(epoch) else {
                    return;
                };
                let text = item.spoken_text.clone();

                self.shared.speaker.speak(&text);
                inner.status_text = format!("Reading answer {} of {}", index + 1, total);
                self.publish(&inner);
                index
            };

            time::sleep(self.shared.settings.speech_pacing).await;

            let mut inner = self.shared.inner.lock().await;
            if inner.generation != generation {
                return;
            }

            match inner.readout.advance(index, epoch) {
                AdvanceOutcome::Next => {}
                AdvanceOutcome::Finished => {
                    let total = inner.readout.len();
                    info!("✓ 朗读完成，共 {} 条", total);
                    inner.status_text = format!("Finished reading {} answer{}", total, plural(total));
                    inner.readout_task = None;
                    self.publish(&inner);
                    return;
                }
                AdvanceOutcome::Stale => return,
            }
        }
    }

    fn publish(&self, inner: &SessionInner) {
        // 没有订阅者时发送失败，忽略
        let _ = self.shared.events.send(inner.snapshot());
    }
}

fn processing_text(count: usize) -> String {
    format!("Processing {} photo{}...", count, plural(count))
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
