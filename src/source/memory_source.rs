use async_trait::async_trait;
use std::fs;
use std::path::Path;

use crate::error::SourceError;
use crate::game::Replay;

use super::service::{ReplaySource, ReplaySourceType};

/// 保持しているリプレイをそのまま返す供給元
#[derive(Debug, Clone, Default)]
pub struct InMemoryReplaySource {
    replays: Vec<Replay>,
    source_type: Option<ReplaySourceType>,
}

impl InMemoryReplaySource {
    pub fn new(replays: Vec<Replay>) -> Self {
        Self {
            replays,
            source_type: None,
        }
    }

    /// JSON配列のファイルからリプレイを読み込む
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let content = fs::read_to_string(path.as_ref())?;
        let replays: Vec<Replay> = serde_json::from_str(&content)?;

        tracing::info!(path = %path.as_ref().display(), count = replays.len(), "replays read from file");
        Ok(Self {
            replays,
            source_type: Some(ReplaySourceType::File),
        })
    }

    pub fn replays(&self) -> &[Replay] {
        &self.replays
    }

    pub fn push(&mut self, replay: Replay) {
        self.replays.push(replay);
    }
}

#[async_trait]
impl ReplaySource for InMemoryReplaySource {
    async fn load_replays(&self) -> Result<Vec<Replay>, SourceError> {
        Ok(self.replays.clone())
    }

    fn name(&self) -> &'static str {
        "InMemoryReplaySource"
    }

    fn source_type(&self) -> ReplaySourceType {
        self.source_type.unwrap_or(ReplaySourceType::Memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mock_source::{MockReplaySource, MockSourceConfig};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn sample_replays() -> Vec<Replay> {
        MockReplaySource::new(MockSourceConfig {
            game_count: 2,
            ..MockSourceConfig::default()
        })
        .generate()
    }

    #[tokio::test]
    async fn test_returns_held_replays() {
        let replays = sample_replays();
        let source = InMemoryReplaySource::new(replays.clone());

        assert_eq!(source.source_type(), ReplaySourceType::Memory);
        assert_eq!(source.load_replays().await.unwrap(), replays);
    }

    #[tokio::test]
    async fn test_from_json_file() {
        let replays = sample_replays();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&replays).unwrap().as_bytes()).unwrap();

        let source = InMemoryReplaySource::from_json_file(file.path()).unwrap();
        assert_eq!(source.source_type(), ReplaySourceType::File);
        assert_eq!(source.load_replays().await.unwrap(), replays);
    }

    #[test]
    fn test_from_json_file_errors() {
        let missing = InMemoryReplaySource::from_json_file("/nonexistent/replays.json");
        assert!(matches!(missing, Err(SourceError::IoError { .. })));

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not json").unwrap();
        let invalid = InMemoryReplaySource::from_json_file(file.path());
        assert!(matches!(invalid, Err(SourceError::ParseError { .. })));
    }
}
