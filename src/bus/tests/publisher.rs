//! Tests for multi-destination fanout

#[cfg(test)]
mod tests {
    use crate::bus::api::*;
    use std::sync::Arc;

    fn queue(name: &str, capacity: usize) -> Arc<Queue> {
        Arc::new(Queue::new(name, capacity, QueueOptions::non_blocking()).unwrap())
    }

    #[test]
    fn test_fanout_continues_past_full_destination() {
        let q1 = queue("q1", 4);
        let q2 = queue("q2", 1);
        let q3 = queue("q3", 4);
        q2.push(Outgoing::copy(b"filler")).unwrap();

        let destinations = [Arc::clone(&q1), Arc::clone(&q2), Arc::clone(&q3)];
        let result = publish(&destinations, Outgoing::copy(b"m"));

        assert!(matches!(result, Err(BusError::Full { .. })));
        assert_eq!(q1.pop().unwrap().unwrap().payload(), b"m");
        assert_eq!(q3.pop().unwrap().unwrap().payload(), b"m");
        assert!(q2.is_overrun());
    }

    #[test]
    fn test_report_names_each_outcome() {
        let q1 = queue("q1", 4);
        let q2 = queue("q2", 1);
        q2.push(Outgoing::copy(b"filler")).unwrap();

        let report = publish_with_report(&[q1, q2], Outgoing::copy(b"m"));

        assert!(report.is_partial());
        assert_eq!(report.delivered, vec!["q1".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "q2");
    }

    #[test]
    fn test_last_error_is_returned() {
        let q1 = queue("q1", 1);
        let q2 = queue("q2", 1);
        q1.push(Outgoing::copy(b"f")).unwrap();
        q2.push(Outgoing::copy(b"f")).unwrap();

        match publish(&[q1, q2], Outgoing::copy(b"m")) {
            Err(BusError::Full { queue, .. }) => assert_eq!(queue, "q2"),
            other => panic!("Expected Full from q2, got {:?}", other),
        }
    }

    #[test]
    fn test_each_destination_gets_an_independent_copy() {
        let q1 = queue("q1", 2);
        let q2 = queue("q2", 2);
        publish(&[Arc::clone(&q1), Arc::clone(&q2)], Outgoing::copy(b"same")).unwrap();

        let a = q1.pop().unwrap().unwrap().into_payload();
        let b = q2.pop().unwrap().unwrap().into_payload();
        assert_eq!(a, b);
        assert_ne!(a.as_ptr(), b.as_ptr());
    }

    #[test]
    fn test_transfer_to_many_destinations_is_refused() {
        let q1 = queue("q1", 2);
        let q2 = queue("q2", 2);

        let result = publish(
            &[Arc::clone(&q1), Arc::clone(&q2)],
            Outgoing::transfer(vec![1, 2, 3]),
        );

        assert!(matches!(
            result,
            Err(BusError::OwnershipConflict { destinations: 2 })
        ));
        assert!(q1.is_empty());
        assert!(q2.is_empty());
    }

    #[test]
    fn test_transfer_to_single_destination() {
        let q1 = queue("q1", 2);
        publish(&[Arc::clone(&q1)], Outgoing::transfer(vec![4, 5])).unwrap();

        let element = q1.pop().unwrap().unwrap();
        assert_eq!(element.ownership(), Ownership::FreeOnPop);
        assert_eq!(element.payload(), &[4, 5]);
    }

    #[test]
    fn test_idempotent_subscribe_delivers_once() {
        let inbox = queue("inbox", 8);
        let wake = WakeHandle::new();
        inbox.add_listener(&wake);
        inbox.add_listener(&wake);

        let destinations = Destinations::new();
        destinations.subscribe(Arc::clone(&inbox));
        destinations.subscribe(Arc::clone(&inbox));

        destinations.publish(Outgoing::copy(b"once")).unwrap();

        assert_eq!(inbox.len(), 1);
        assert_eq!(wake.notifications(), 1);
    }
}
