//! Offline fragment source.
//!
//! A replay script is JSON lines: every non-empty line is one [`RawFragment`] in its wire form.
//! A string is plain text, an array is a block list, and anything else replays as an
//! unrecognized fragment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use super::{FragmentStream, Provider};
use crate::error::{Error, Result};
use crate::fragment::RawFragment;
use crate::turn::Turn;

#[derive(Clone, Debug)]
enum Script {
    File(PathBuf),
    Fragments(Vec<Result<RawFragment>>),
}

/// Replays a fixed sequence of fragments for every turn.
#[derive(Clone, Debug)]
pub struct ReplayProvider {
    script: Script,
    delay: Duration,
}

impl ReplayProvider {
    /// Replays the script at `path`.  The file is read anew on every turn.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self {
            script: Script::File(path.as_ref().to_path_buf()),
            delay: Duration::ZERO,
        }
    }

    /// Replays `fragments`, errors included.
    pub fn from_fragments(fragments: impl IntoIterator<Item = Result<RawFragment>>) -> Self {
        Self {
            script: Script::Fragments(fragments.into_iter().collect()),
            delay: Duration::ZERO,
        }
    }

    /// Sleep for `delay` before each fragment.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    async fn fragments(&self) -> Result<Vec<Result<RawFragment>>> {
        match &self.script {
            Script::Fragments(fragments) => Ok(fragments.clone()),
            Script::File(path) => {
                let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                    Error::io(format!("cannot read replay script {}", path.display()), e)
                })?;
                Ok(parse_script(&text))
            }
        }
    }
}

#[async_trait]
impl Provider for ReplayProvider {
    fn name(&self) -> &str {
        "replay"
    }

    async fn send(&self, turn: &Turn) -> Result<FragmentStream> {
        let fragments = self.fragments().await?;
        tracing::debug!(
            thread_id = %turn.thread_id,
            fragments = fragments.len(),
            "replaying script"
        );
        let delay = self.delay;
        if delay.is_zero() {
            return Ok(Box::pin(stream::iter(fragments)));
        }
        Ok(Box::pin(stream::iter(fragments).then(move |fragment| async move {
            tokio::time::sleep(delay).await;
            fragment
        })))
    }
}

/// Parses a replay script.
///
/// Lines that are not JSON become serialization errors in place, so a turn replays everything
/// before the bad line and fails when it gets there.
pub fn parse_script(text: &str) -> Vec<Result<RawFragment>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<RawFragment>(line).map_err(|e| {
                Error::serialization(
                    format!("replay script line {}: {e}", idx + 1),
                    Some(Box::new(e)),
                )
            })
        })
        .collect()
}
