use parwork::transport::{drive, star, Message, Star, Transport};
use parwork::{
    ArraySum, ChannelMode, ChunkDescriptor, Error, Hello, MessagePassing, SharedMemory,
    TransportError,
};
use std::thread;

#[test]
fn test_both_transports_agree() {
    let input: Vec<i32> = (0..1000).map(|i| i % 10).collect();
    for workers in [1, 4, 7] {
        let shared = drive(&SharedMemory::new(workers).unwrap(), &ArraySum, &input).unwrap();
        for mode in [ChannelMode::Buffered, ChannelMode::Rendezvous] {
            let mp = MessagePassing::new(workers).unwrap().with_mode(mode);
            assert_eq!(drive(&mp, &ArraySum, &input).unwrap(), shared);
        }
    }
}

#[test]
fn test_transport_names() {
    assert_eq!(Transport::name(&SharedMemory::new(1).unwrap()), "threads");
    let mp = MessagePassing::new(2).unwrap();
    assert_eq!(Transport::name(&mp), "processes");
    assert_eq!(Transport::workers(&mp), 2);
    assert_eq!(mp.mode(), ChannelMode::Buffered);
}

#[test]
fn test_zero_ranks_rejected() {
    assert!(matches!(
        MessagePassing::new(0),
        Err(Error::InvalidConfiguration(_))
    ));
}

#[test]
fn test_more_ranks_than_items() {
    let mp = MessagePassing::new(9).unwrap();
    assert_eq!(drive(&mp, &Hello, &3).unwrap(), vec![0, 1, 2]);
}

#[test]
fn test_tagged_exchange_over_star() {
    type Msg = Message<Vec<i32>, i64>;
    let Star {
        coordinator,
        workers,
    } = star::<Msg>(3, ChannelMode::Rendezvous).unwrap();

    thread::scope(|s| {
        for worker in workers {
            s.spawn(move || {
                let chunk = match worker.recv().unwrap() {
                    Message::Descriptor(chunk) => chunk,
                    other => panic!("unexpected {}", other.kind()),
                };
                let sum = match worker.recv().unwrap() {
                    Message::Shard(data) => data.iter().map(|&v| i64::from(v)).sum(),
                    other => panic!("unexpected {}", other.kind()),
                };
                worker.send(Message::Descriptor(chunk)).unwrap();
                worker.send(Message::Partial(vec![sum])).unwrap();
            });
        }

        for rank in 1..3 {
            let chunk = ChunkDescriptor::new(rank, rank * 2, 2);
            coordinator.send(rank, Message::Descriptor(chunk)).unwrap();
            coordinator
                .send(rank, Message::Shard(vec![rank as i32; 2]))
                .unwrap();
        }
        for rank in 1..3 {
            assert_eq!(
                coordinator.recv(rank).unwrap(),
                Message::Descriptor(ChunkDescriptor::new(rank, rank * 2, 2))
            );
            assert_eq!(
                coordinator.recv(rank).unwrap(),
                Message::Partial(vec![2 * rank as i64])
            );
        }
    });
}

#[test]
fn test_unknown_peer() {
    let Star { coordinator, .. } = star::<u8>(2, ChannelMode::Buffered).unwrap();
    assert_eq!(
        coordinator.recv(5),
        Err(TransportError::UnknownPeer {
            rank: 5,
            world_size: 2
        })
    );
}
