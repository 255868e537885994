use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use roboseed_control::SeekStatus;
use roboseed_kinematics::{ChassisPower, Vec2, WheelPowers};

/// Broadcast topic with bounded capacity.
/// `T` must be `Send + Sync` because we hop across threads.
#[derive(Debug, Clone)]
pub struct Topic<T> {
    tx: broadcast::Sender<Arc<T>>,
}

impl<T: Send + Sync + 'static> Topic<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns the number of subscribers that will see `msg`.
    pub fn publish(&self, msg: T) -> usize {
        self.tx.send(Arc::new(msg)).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<T>> {
        self.tx.subscribe()
    }
}

/// One control tick as seen by the route runner.
#[derive(Debug, Clone)]
pub struct Telemetry {
    pub route_step: usize,
    pub elapsed: Duration,
    /// Estimated position, not ground truth.
    pub position: Vec2,
    pub heading: f64,
    /// Body-frame position error at the last translational law evaluation.
    pub position_error: Vec2,
    /// Heading error at the last rotational law evaluation, rad.
    pub heading_error: f64,
    pub power: ChassisPower,
    /// Wheel powers as sent to the motors.
    pub wheels: WheelPowers,
    pub status: SeekStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let topic: Topic<u32> = Topic::new(4);
        assert_eq!(topic.publish(1), 0);
    }

    #[test]
    fn test_subscribers_see_messages_in_order() {
        let topic: Topic<u32> = Topic::new(4);
        let mut rx = topic.subscribe();
        assert_eq!(topic.publish(1), 1);
        topic.publish(2);
        assert_eq!(*rx.try_recv().unwrap(), 1);
        assert_eq!(*rx.try_recv().unwrap(), 2);
        assert!(rx.try_recv().is_err());
    }
}
