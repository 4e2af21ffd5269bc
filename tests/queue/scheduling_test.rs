//! Scheduling across lanes through the public queue API.

use std::sync::{Arc, Mutex};

use omnisharp_supervisor::protocol::commands;
use omnisharp_supervisor::queue::{
    Lane, QueueError, Request, RequestError, RequestOutcome, RequestQueueCollection, RequestSink,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<u64>>,
}

impl RecordingSink {
    fn sent(&self) -> Vec<u64> {
        self.sent.lock().unwrap().clone()
    }
}

impl RequestSink for RecordingSink {
    fn send(&self, request: &Request) -> Result<(), QueueError> {
        self.sent.lock().unwrap().push(request.seq());
        Ok(())
    }
}

fn setup(concurrency: usize) -> (RequestQueueCollection, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    (RequestQueueCollection::new(concurrency, sink.clone()), sink)
}

fn submit(
    queues: &RequestQueueCollection,
    seq: u64,
    command: &str,
) -> oneshot::Receiver<RequestOutcome> {
    let (request, rx) = Request::new(seq, command, Value::Null);
    queues.enqueue(request);
    rx
}

fn respond(queues: &RequestQueueCollection, command: &str, seq: u64) {
    let request = queues.dequeue(command, seq).expect("request is waiting");
    request.resolve(json!({ "seq": seq }));
    queues.drain();
}

#[test]
fn ten_normal_requests_with_concurrency_two() {
    let (queues, sink) = setup(2);
    let mut receivers: Vec<_> = (1..=10)
        .map(|seq| submit(&queues, seq, commands::FIND_SYMBOLS))
        .collect();

    assert_eq!(sink.sent(), vec![1, 2]);
    assert_eq!(queues.waiting_len(Lane::Normal), 2);
    assert_eq!(queues.pending_len(Lane::Normal), 8);

    respond(&queues, commands::FIND_SYMBOLS, 1);
    assert_eq!(sink.sent(), vec![1, 2, 3]);

    let mut next_response = 2;
    while next_response <= 10 {
        assert!(queues.waiting_len(Lane::Normal) <= 2);
        respond(&queues, commands::FIND_SYMBOLS, next_response);
        next_response += 1;
    }

    assert_eq!(sink.sent(), (1..=10).collect::<Vec<_>>());
    assert!(queues.is_empty());
    for (index, rx) in receivers.iter_mut().enumerate() {
        let outcome = rx.try_recv().expect("settled exactly once");
        assert_eq!(outcome, Ok(json!({ "seq": index as u64 + 1 })));
    }
}

#[test]
fn lane_capacities_follow_concurrency() {
    let (queues, _sink) = setup(8);
    assert_eq!(queues.capacity(Lane::Priority), 1);
    assert_eq!(queues.capacity(Lane::Normal), 8);
    assert_eq!(queues.capacity(Lane::Deferred), 2);

    let (queues, _sink) = setup(16);
    assert_eq!(queues.capacity(Lane::Deferred), 4);
}

#[test]
fn waiting_never_exceeds_capacity_in_any_lane() {
    let (queues, sink) = setup(4);
    let mix = [
        commands::UPDATE_BUFFER,
        commands::CODE_CHECK,
        commands::AUTO_COMPLETE,
        commands::CHANGE_BUFFER,
        commands::PROJECTS,
        commands::TYPE_LOOKUP,
    ];
    let mut submitted = Vec::new();
    let mut receivers = Vec::new();
    let mut answered = Vec::new();

    let answer_oldest = |submitted: &[(u64, &str)], answered: &mut Vec<u64>| {
        let sent = sink.sent();
        let oldest = submitted
            .iter()
            .find(|(seq, _)| sent.contains(seq) && !answered.contains(seq))
            .copied();
        if let Some((seq, command)) = oldest {
            respond(&queues, command, seq);
            answered.push(seq);
        }
    };

    for seq in 1..=60u64 {
        let command = mix[usize::try_from(seq).unwrap() % mix.len()];
        receivers.push(submit(&queues, seq, command));
        submitted.push((seq, command));
        for lane in Lane::ALL {
            assert!(queues.waiting_len(lane) <= queues.capacity(lane));
        }
        if seq % 3 == 0 {
            answer_oldest(&submitted, &mut answered);
        }
    }

    while answered.len() < submitted.len() {
        answer_oldest(&submitted, &mut answered);
        for lane in Lane::ALL {
            assert!(queues.waiting_len(lane) <= queues.capacity(lane));
        }
    }

    assert!(queues.is_empty());
    for mut rx in receivers {
        assert!(rx.try_recv().unwrap().is_ok());
    }
}

#[test]
fn dispatch_order_within_a_lane_is_fifo() {
    let (queues, sink) = setup(1);
    let _rx: Vec<_> = [5, 6, 7]
        .into_iter()
        .map(|seq| submit(&queues, seq, commands::CODE_CHECK))
        .collect();

    // Deferred capacity is 2 even with concurrency 1.
    assert_eq!(sink.sent(), vec![5, 6]);
    respond(&queues, commands::CODE_CHECK, 6);
    assert_eq!(sink.sent(), vec![5, 6, 7]);
}

#[test]
fn cancelled_pending_request_is_never_dispatched() {
    let (queues, sink) = setup(1);
    let _first = submit(&queues, 1, commands::UPDATE_BUFFER);
    let mut second = submit(&queues, 2, commands::UPDATE_BUFFER);

    assert!(queues.cancel(commands::UPDATE_BUFFER, 2));
    assert_eq!(
        second.try_recv().unwrap(),
        Err(RequestError::Cancelled(commands::UPDATE_BUFFER.to_string()))
    );

    respond(&queues, commands::UPDATE_BUFFER, 1);
    assert_eq!(sink.sent(), vec![1]);
    assert!(queues.is_empty());
}

#[test]
fn cancel_after_send_is_a_no_op() {
    let (queues, _sink) = setup(1);
    let mut rx = submit(&queues, 1, commands::UPDATE_BUFFER);

    assert!(!queues.cancel(commands::UPDATE_BUFFER, 1));
    assert!(rx.try_recv().is_err(), "still waiting for the response");

    respond(&queues, commands::UPDATE_BUFFER, 1);
    assert!(rx.try_recv().unwrap().is_ok());
}

#[test]
fn duplicate_response_is_dropped() {
    let (queues, _sink) = setup(2);
    let _rx = submit(&queues, 1, commands::FIND_USAGES);

    respond(&queues, commands::FIND_USAGES, 1);
    assert!(queues.dequeue(commands::FIND_USAGES, 1).is_none());
}
