//! メモリ使用量の取得
//! 実行環境がメモリ情報を公開していない場合は`None`を返し、
//! メモリ関連の提案を出さないだけで処理は継続する。

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// `/proc/self/statm`のページサイズ（Linuxの標準値）
const PAGE_SIZE_BYTES: u64 = 4096;

/// ある時点のメモリ使用量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemorySample {
    pub used_bytes: u64,
    pub limit_bytes: u64,
}

impl MemorySample {
    /// 上限に対する使用率（0.0-1.0）。上限0の場合は0
    pub fn usage_ratio(&self) -> f64 {
        if self.limit_bytes == 0 {
            0.0
        } else {
            self.used_bytes as f64 / self.limit_bytes as f64
        }
    }
}

/// メモリ使用量の取得方法を抽象化するtrait
pub trait MemoryProbe: Send + Sync {
    fn sample(&self) -> Option<MemorySample>;

    fn name(&self) -> &'static str;
}

/// メモリ情報を持たない環境用
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMemoryProbe;

impl MemoryProbe for NoMemoryProbe {
    fn sample(&self) -> Option<MemorySample> {
        None
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// プロセスの常駐メモリを設定した上限と比較する
#[derive(Debug, Clone)]
pub struct ProcessMemoryProbe {
    statm_path: PathBuf,
    limit_bytes: u64,
}

impl ProcessMemoryProbe {
    pub fn new(limit_bytes: u64) -> Self {
        Self::with_path("/proc/self/statm", limit_bytes)
    }

    /// 読み取り元を差し替えて作成する（テスト用）
    pub fn with_path(path: impl Into<PathBuf>, limit_bytes: u64) -> Self {
        Self {
            statm_path: path.into(),
            limit_bytes,
        }
    }

    pub fn limit_bytes(&self) -> u64 {
        self.limit_bytes
    }
}

impl MemoryProbe for ProcessMemoryProbe {
    fn sample(&self) -> Option<MemorySample> {
        if self.limit_bytes == 0 {
            return None;
        }

        let content = fs::read_to_string(&self.statm_path).ok()?;
        let resident_pages = parse_resident_pages(&content)?;

        Some(MemorySample {
            used_bytes: resident_pages.saturating_mul(PAGE_SIZE_BYTES),
            limit_bytes: self.limit_bytes,
        })
    }

    fn name(&self) -> &'static str {
        "process"
    }
}

/// statmの2列目（常駐ページ数）を取り出す
fn parse_resident_pages(statm: &str) -> Option<u64> {
    statm.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_no_probe_never_samples() {
        assert_eq!(NoMemoryProbe.sample(), None);
    }

    #[test]
    fn test_parse_resident_pages() {
        assert_eq!(parse_resident_pages("5000 1200 300 10 0 900 0\n"), Some(1200));
        assert_eq!(parse_resident_pages("5000"), None);
        assert_eq!(parse_resident_pages("a b c"), None);
    }

    #[test]
    fn test_process_probe_reads_statm_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "5000 256 100 10 0 200 0").unwrap();

        let probe = ProcessMemoryProbe::with_path(file.path(), 2 * 1024 * 1024);
        let sample = probe.sample().unwrap();

        assert_eq!(sample.used_bytes, 256 * 4096);
        assert_eq!(sample.usage_ratio(), 0.5);
    }

    #[test]
    fn test_process_probe_is_absent_without_source() {
        let probe = ProcessMemoryProbe::with_path("/nonexistent/statm", 1024);
        assert_eq!(probe.sample(), None);

        let unlimited = ProcessMemoryProbe::with_path("/nonexistent/statm", 0);
        assert_eq!(unlimited.sample(), None);
    }
}
