//! 描画時間とメモリ使用量の監視
//! 直近のサンプルから平均描画時間とフレーム落ちを計算し、
//! しきい値を超えた項目ごとに改善提案を返す。

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::memory::{MemoryProbe, MemorySample, NoMemoryProbe};

/// 保持するサンプル数
pub const DEFAULT_SAMPLE_WINDOW: usize = 60;
/// 60fpsを維持するための1フレームの時間（ミリ秒）
pub const FRAME_BUDGET_MS: f64 = 1000.0 / 60.0;

/// 提案を出すしきい値
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceThresholds {
    pub sample_window: usize,
    pub frame_budget_ms: f64,
    /// 平均描画時間がこれを超えると警告
    pub slow_render_ms: f64,
    /// ウィンドウ内のフレーム落ちがこれを超えると警告
    pub max_frame_drops: usize,
    /// メモリ使用率がこれを超えると警告（0.0-1.0）
    pub memory_usage_ratio: f64,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            sample_window: DEFAULT_SAMPLE_WINDOW,
            frame_budget_ms: FRAME_BUDGET_MS,
            slow_render_ms: 16.0,
            max_frame_drops: 5,
            memory_usage_ratio: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// 平均描画時間（ミリ秒）。サンプルがなければ0
    pub average_render_time: f64,
    pub frame_drop_count: usize,
    pub sample_count: usize,
    pub memory: Option<MemorySample>,
}

/// 描画性能モニタ
pub struct PerformanceMonitor {
    thresholds: PerformanceThresholds,
    samples: VecDeque<f64>,
    started_at: Option<Instant>,
    last_memory: Option<MemorySample>,
    probe: Box<dyn MemoryProbe>,
}

impl PerformanceMonitor {
    pub fn new(thresholds: PerformanceThresholds, probe: Box<dyn MemoryProbe>) -> Self {
        let sample_window = thresholds.sample_window.max(1);
        Self {
            thresholds: PerformanceThresholds { sample_window, ..thresholds },
            samples: VecDeque::with_capacity(sample_window),
            started_at: None,
            last_memory: None,
            probe,
        }
    }

    pub fn thresholds(&self) -> &PerformanceThresholds {
        &self.thresholds
    }

    pub fn probe_name(&self) -> &'static str {
        self.probe.name()
    }

    /// 計測を開始する
    pub fn start_timing(&mut self) {
        self.started_at = Some(Instant::now());
    }

    /// 計測を終了してサンプルを記録する
    /// 開始していない場合は何もせずNone
    pub fn end_timing(&mut self) -> Option<f64> {
        let started_at = self.started_at.take()?;
        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        self.record_sample(elapsed_ms);
        Some(elapsed_ms)
    }

    /// 描画時間のサンプルを記録する（古いものから捨てる）
    pub fn record_sample(&mut self, render_ms: f64) {
        if self.samples.len() == self.thresholds.sample_window {
            self.samples.pop_front();
        }
        self.samples.push_back(render_ms);
    }

    /// メモリ使用量を取得して保持する
    pub fn sample_memory(&mut self) -> Option<MemorySample> {
        self.last_memory = self.probe.sample();
        self.last_memory
    }

    pub fn metrics(&self) -> PerformanceMetrics {
        let sample_count = self.samples.len();
        let average_render_time = if sample_count == 0 {
            0.0
        } else {
            self.samples.iter().sum::<f64>() / sample_count as f64
        };
        let frame_drop_count = self
            .samples
            .iter()
            .filter(|&&ms| ms > self.thresholds.frame_budget_ms)
            .count();

        PerformanceMetrics {
            average_render_time,
            frame_drop_count,
            sample_count,
            memory: self.last_memory,
        }
    }

    /// 改善提案を返す（常に1件以上）
    pub fn suggestions(&self) -> Vec<String> {
        let metrics = self.metrics();
        let mut suggestions = Vec::new();

        if metrics.average_render_time > self.thresholds.slow_render_ms {
            suggestions.push(format!(
                "Average render time {:.2}ms exceeds {}ms. Consider reducing the number of rendered items.",
                metrics.average_render_time, self.thresholds.slow_render_ms
            ));
        }

        if metrics.frame_drop_count > self.thresholds.max_frame_drops {
            suggestions.push(format!(
                "{} frame drops in the last {} samples. Consider enabling virtual scrolling.",
                metrics.frame_drop_count, metrics.sample_count
            ));
        }

        if let Some(memory) = metrics.memory {
            let ratio = memory.usage_ratio();
            if ratio > self.thresholds.memory_usage_ratio {
                suggestions.push(format!(
                    "Memory usage is at {:.0}% of the limit. Consider clearing replay caches.",
                    ratio * 100.0
                ));
            }
        }

        if suggestions.is_empty() {
            suggestions.push("Performance is optimized.".to_string());
        }

        suggestions
    }

    /// サンプルと計測状態を破棄する
    pub fn reset(&mut self) {
        self.samples.clear();
        self.started_at = None;
        self.last_memory = None;
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new(PerformanceThresholds::default(), Box::new(NoMemoryProbe))
    }
}

impl std::fmt::Debug for PerformanceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMonitor")
            .field("thresholds", &self.thresholds)
            .field("samples", &self.samples.len())
            .field("probe", &self.probe.name())
            .finish()
    }
}

/// 共有されるモニタ
pub type SharedMonitor = Arc<Mutex<PerformanceMonitor>>;

/// バックグラウンドのメモリサンプリングタスク
/// `stop`を呼ぶかハンドルを破棄するとタスクを中断する
#[derive(Debug)]
pub struct SamplerHandle {
    task: JoinHandle<()>,
}

impl SamplerHandle {
    pub fn stop(self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// 一定間隔でメモリ使用量を取得するタスクを起動する
pub fn spawn_sampler(monitor: SharedMonitor, interval: Duration) -> SamplerHandle {
    let period = interval.max(Duration::from_millis(1));
    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let sample = monitor.lock().await.sample_memory();
            if let Some(sample) = sample {
                tracing::trace!(used_bytes = sample.used_bytes, limit_bytes = sample.limit_bytes, "memory sampled");
            }
        }
    });

    tracing::debug!(interval_ms = period.as_millis() as u64, "performance sampler started");
    SamplerHandle { task }
}
