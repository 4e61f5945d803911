//! Host adapters for the command-line runtime.
//!
//! # Responsibility
//! - Back the permission ports with environment flags read on every query.
//! - Replay a scripted track of position fixes as a fix source.
//! - Print the permission prompt to the terminal.

use async_trait::async_trait;
use geomemo_core::{
    FixFilter, FixRequest, FixSource, FixSourceError, GeoPoint, PermissionPrompt,
    PermissionProvider,
};
use log::{debug, info};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const LOCATION_GRANTED_ENV: &str = "GEOMEMO_LOCATION_GRANTED";
const NOTIFICATION_GRANTED_ENV: &str = "GEOMEMO_NOTIFICATION_GRANTED";
const FIX_CHANNEL_CAPACITY: usize = 16;

/// Grants from environment flags. Unset means granted.
pub struct EnvPermissions;

impl EnvPermissions {
    fn flag(key: &str) -> bool {
        match std::env::var(key) {
            Ok(value) => matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "granted"
            ),
            Err(_) => true,
        }
    }
}

impl PermissionProvider for EnvPermissions {
    fn is_location_granted(&self) -> bool {
        Self::flag(LOCATION_GRANTED_ENV)
    }

    fn is_notification_granted(&self) -> bool {
        Self::flag(NOTIFICATION_GRANTED_ENV)
    }
}

pub struct ConsolePrompt;

impl PermissionPrompt for ConsolePrompt {
    fn request_permissions(&self) {
        info!("event=permission_prompt module=cli status=ok");
        eprintln!(
            "location monitoring needs permissions: set {LOCATION_GRANTED_ENV}=1 and {NOTIFICATION_GRANTED_ENV}=1"
        );
    }
}

/// Replays `lat,lon` lines as fixes.
///
/// Line `n` is treated as observed `n * interval` after the start, so the
/// spacing and displacement rules apply as they would on a real track.
/// Playback runs at `pace` per delivered fix and the stream closes at the end.
pub struct ScriptedFixSource {
    fixes: Vec<GeoPoint>,
    pace: Duration,
    playback: Mutex<Option<CancellationToken>>,
}

impl ScriptedFixSource {
    pub fn from_file(path: &Path, pace: Duration) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|err| {
            anyhow::anyhow!("failed to read fix script `{}`: {err}", path.display())
        })?;
        Ok(Self::new(parse_script(&text)?, pace))
    }

    pub fn new(fixes: Vec<GeoPoint>, pace: Duration) -> Self {
        Self {
            fixes,
            pace,
            playback: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.playback.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl FixSource for ScriptedFixSource {
    async fn start(&self, request: FixRequest) -> Result<mpsc::Receiver<GeoPoint>, FixSourceError> {
        if self.fixes.is_empty() {
            return Err(FixSourceError::Unavailable("fix script is empty".to_string()));
        }

        let token = CancellationToken::new();
        if let Some(previous) = self.lock().replace(token.clone()) {
            previous.cancel();
        }

        let (sender, receiver) = mpsc::channel(FIX_CHANNEL_CAPACITY);
        let fixes = self.fixes.clone();
        let pace = self.pace;
        tokio::spawn(async move {
            let mut filter = FixFilter::new(&request);
            let mut observed_at = Instant::now();
            let mut delivered = 0usize;
            for fix in fixes {
                let accepted = filter.accept(fix, observed_at);
                observed_at += request.interval;
                if !accepted {
                    continue;
                }
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = tokio::time::sleep(pace) => {}
                }
                if sender.send(fix).await.is_err() {
                    return;
                }
                delivered += 1;
            }
            debug!("event=fix_script module=cli status=ok delivered={delivered}");
        });

        Ok(receiver)
    }

    fn stop(&self) {
        if let Some(token) = self.lock().take() {
            token.cancel();
        }
    }
}

/// Parses `lat,lon` lines. Blank lines and `#` comments are skipped.
pub fn parse_script(text: &str) -> anyhow::Result<Vec<GeoPoint>> {
    let mut fixes = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line_no = index + 1;
        let (lat, lon) = line
            .split_once(',')
            .ok_or_else(|| anyhow::anyhow!("line {line_no}: expected `lat,lon`"))?;
        let point = GeoPoint::new(
            lat.trim()
                .parse()
                .map_err(|err| anyhow::anyhow!("line {line_no}: bad latitude: {err}"))?,
            lon.trim()
                .parse()
                .map_err(|err| anyhow::anyhow!("line {line_no}: bad longitude: {err}"))?,
        );
        if !point.is_valid() {
            anyhow::bail!("line {line_no}: coordinates out of range");
        }
        fixes.push(point);
    }
    Ok(fixes)
}

#[cfg(test)]
mod tests {
    use super::{parse_script, ScriptedFixSource};
    use geomemo_core::{FixRequest, FixSource, FixSourceError, GeoPoint};
    use std::time::Duration;

    fn request() -> FixRequest {
        FixRequest {
            interval: Duration::from_secs(10),
            min_interval: Duration::from_secs(5),
            min_displacement_meters: 10.0,
        }
    }

    #[test]
    fn script_parser_skips_comments_and_rejects_garbage() {
        let fixes = parse_script("# walk\n41.5, 41.6\n\n41.7,41.8\n").unwrap();
        assert_eq!(
            fixes,
            vec![GeoPoint::new(41.5, 41.6), GeoPoint::new(41.7, 41.8)]
        );

        assert!(parse_script("41.5").is_err());
        assert!(parse_script("north,41.6").is_err());
        assert!(parse_script("95.0,41.6").is_err());
    }

    #[tokio::test]
    async fn playback_applies_displacement_filter_and_closes() {
        let source = ScriptedFixSource::new(
            vec![
                GeoPoint::new(41.0, 41.0),
                GeoPoint::new(41.00001, 41.0),
                GeoPoint::new(41.001, 41.0),
            ],
            Duration::from_millis(1),
        );

        let mut fixes = source.start(request()).await.unwrap();
        let mut delivered = Vec::new();
        while let Some(fix) = fixes.recv().await {
            delivered.push(fix);
        }

        assert_eq!(
            delivered,
            vec![GeoPoint::new(41.0, 41.0), GeoPoint::new(41.001, 41.0)]
        );
    }

    #[tokio::test]
    async fn empty_script_cannot_start() {
        let source = ScriptedFixSource::new(Vec::new(), Duration::ZERO);
        assert!(matches!(
            source.start(request()).await,
            Err(FixSourceError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn stop_ends_playback() {
        let source = ScriptedFixSource::new(
            vec![GeoPoint::new(41.0, 41.0); 4],
            Duration::from_secs(60),
        );
        let mut fixes = source.start(request()).await.unwrap();
        source.stop();
        assert!(fixes.recv().await.is_none());
    }
}
