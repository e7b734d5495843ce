use log::debug;
use serde::Serialize;
use tokio::sync::broadcast;
use crate::models::department::SectionId;

pub const DEPARTMENT_SECTIONS_CHANGED: &str = "department-sections-changed";

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Moved,
    Reordered,
    VisibilityChanged,
    Renamed,
    Reset,
    Undone,
}

/// Payload delivered to every subscribed view after a successful mutation.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SectionChangeEvent {
    pub name: &'static str,
    pub kind: ChangeKind,
    /// None when the change covers the whole scope (reset all).
    pub department_id: Option<String>,
    pub section_id: Option<SectionId>,
    pub affected_rows: u64,
}

impl SectionChangeEvent {
    pub fn new(kind: ChangeKind, department_id: Option<&str>, section_id: Option<SectionId>, affected_rows: u64) -> Self {
        SectionChangeEvent {
            name: DEPARTMENT_SECTIONS_CHANGED,
            kind,
            department_id: department_id.map(str::to_string),
            section_id,
            affected_rows,
        }
    }
}

pub struct ChangeBus {
    sender: broadcast::Sender<SectionChangeEvent>,
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        ChangeBus { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SectionChangeEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn publish(&self, event: SectionChangeEvent) {
        match self.sender.send(event) {
            Ok(receivers) => debug!("Delivered section change to {} subscribers", receivers),
            Err(_) => debug!("Section change dropped, no subscribers"),
        }
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        ChangeBus::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_subscriber_sees_the_event() {
        let bus = ChangeBus::default();
        let mut nav = bus.subscribe();
        let mut dashboard = bus.subscribe();

        bus.publish(SectionChangeEvent::new(ChangeKind::Moved, Some("hr"), Some(SectionId::Admin), 2));

        let a = nav.recv().await.unwrap();
        let b = dashboard.recv().await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.name, DEPARTMENT_SECTIONS_CHANGED);
        assert_eq!(a.affected_rows, 2);
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        ChangeBus::default().publish(SectionChangeEvent::new(ChangeKind::Reset, None, None, 3));
    }
}
