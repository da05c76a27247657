use crate::config::Settings;
use crate::error::{Result, ZoneError};
use crate::sync::debounce::{is_zone_file, Debouncer};
use crate::sync::notifier::SecondaryNotifier;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const PUSH_QUEUE: usize = 64;

/// Watches the zone directory and pushes a sync trigger to every secondary
/// when a zone file changes.
///
/// Filesystem events arrive on the watcher thread and are forwarded into a
/// channel. A single task owns the debounce state and hands passing filenames
/// to a second task that performs the HTTP fan-out.
pub struct ZoneWatcher {
    zone_dir: PathBuf,
    forward_suffix: String,
    reverse_suffix: String,
    debounce: Duration,
    notifier: SecondaryNotifier,
}

impl ZoneWatcher {
    pub fn new(settings: &Settings, notifier: SecondaryNotifier) -> Self {
        Self {
            zone_dir: settings.zones.zone_dir.clone(),
            forward_suffix: settings.zones.forward_suffix.clone(),
            reverse_suffix: settings.zones.reverse_suffix.clone(),
            debounce: settings.propagation.debounce_window(),
            notifier,
        }
    }

    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        if !tokio::fs::try_exists(&self.zone_dir).await? {
            error!("Zone directory {} does not exist", self.zone_dir.display());
            return Err(ZoneError::FileNotFound(self.zone_dir.clone()));
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            let _ = event_tx.send(event);
        })
        .map_err(watch_error)?;
        watcher
            .watch(&self.zone_dir, RecursiveMode::NonRecursive)
            .map_err(watch_error)?;

        info!("Watching {} for zone changes", self.zone_dir.display());
        info!("Configured secondaries: {:?}", self.notifier.endpoints());

        self.process(event_rx, cancel).await;
        drop(watcher);
        Ok(())
    }

    async fn process(
        &self,
        mut events: mpsc::UnboundedReceiver<notify::Result<Event>>,
        cancel: CancellationToken,
    ) {
        let (push_tx, mut push_rx) = mpsc::channel::<String>(PUSH_QUEUE);
        let notifier = self.notifier.clone();
        let pusher = tokio::spawn(async move {
            while let Some(filename) = push_rx.recv().await {
                let reports = notifier.push(&filename).await;
                let failed = reports.iter().filter(|r| !r.success).count();
                if failed > 0 {
                    warn!("{} of {} secondaries failed to sync {}", failed, reports.len(), filename);
                }
            }
        });

        let mut debouncer = Debouncer::new(self.debounce);
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    warn!("Watch error: {}", e);
                    continue;
                }
            };

            for filename in self.changed_zone_files(&event) {
                if !debouncer.should_fire(&filename, Instant::now()) {
                    debug!("Suppressed repeat event for {}", filename);
                    continue;
                }
                info!("File modified: {}. Triggering secondary sync", filename);
                if push_tx.send(filename).await.is_err() {
                    error!("Push task stopped, ending watcher");
                    return;
                }
            }
        }

        drop(push_tx);
        let _ = pusher.await;
        info!("Zone watcher stopped");
    }

    fn changed_zone_files(&self, event: &Event) -> Vec<String> {
        if !matches!(event.kind, EventKind::Modify(_)) {
            return Vec::new();
        }

        event
            .paths
            .iter()
            .filter(|path| !path.is_dir())
            .filter_map(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .filter(|name| is_zone_file(name, &self.forward_suffix, &self.reverse_suffix))
            .collect()
    }
}

fn watch_error(e: notify::Error) -> ZoneError {
    ZoneError::Io(std::io::Error::other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, ModifyKind};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn modified(path: &str) -> notify::Result<Event> {
        Ok(Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content))).add_path(PathBuf::from(path)))
    }

    fn watcher_for(endpoints: Vec<String>) -> ZoneWatcher {
        let mut settings = Settings::default();
        settings.zones.zone_dir = PathBuf::from("/var/named");
        let notifier = SecondaryNotifier::new(endpoints, "s3cret", Duration::from_secs(2)).unwrap();
        ZoneWatcher::new(&settings, notifier)
    }

    #[test]
    fn test_only_modified_zone_files_are_reported() {
        let watcher = watcher_for(Vec::new());

        let files = watcher.changed_zone_files(&modified("/var/named/example.com.hosts").unwrap());
        assert_eq!(files, vec!["example.com.hosts"]);

        assert!(watcher
            .changed_zone_files(&modified("/var/named/named.conf").unwrap())
            .is_empty());

        let created = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/var/named/new.hosts"));
        assert!(watcher.changed_zone_files(&created).is_empty());
    }

    #[tokio::test]
    async fn test_burst_of_events_pushes_once_per_file() {
        let secondary = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sync"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&secondary)
            .await;

        let watcher = watcher_for(vec![secondary.uri()]);
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(modified("/var/named/example.com.hosts")).unwrap();
        tx.send(modified("/var/named/example.com.hosts")).unwrap();
        tx.send(Err(notify::Error::generic("inotify queue overflow"))).unwrap();
        tx.send(modified("/var/named/1.168.192.in-addr.arpa.rev")).unwrap();
        tx.send(modified("/var/named/example.com.hosts")).unwrap();
        drop(tx);

        watcher.process(rx, CancellationToken::new()).await;
        secondary.verify().await;
    }

    #[tokio::test]
    async fn test_cancellation_stops_processing() {
        let watcher = watcher_for(Vec::new());
        let (_tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), watcher.process(rx, cancel))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_zone_dir_fails() {
        let mut settings = Settings::default();
        settings.zones.zone_dir = PathBuf::from("/nonexistent/zones");
        let notifier = SecondaryNotifier::new(Vec::new(), "s3cret", Duration::from_secs(1)).unwrap();
        let result = ZoneWatcher::new(&settings, notifier)
            .run(CancellationToken::new())
            .await;
        assert!(matches!(result, Err(ZoneError::FileNotFound(_))));
    }
}
