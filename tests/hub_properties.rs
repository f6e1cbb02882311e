//! Property-based tests для хаба.
//!
//! Случайные наборы подписок, отписок и освобождений владельцев сравниваются
//! с простой моделью: списком `(владелец, уровень типа)` в порядке подписки.

use std::sync::{Arc, Mutex};

use nazar::{message, Handler, Hub};
use proptest::prelude::*;

const PROPTEST_CASES: u32 = 256;

#[derive(Clone, Debug, Default)]
struct Base;

#[derive(Clone, Debug, Default)]
struct Mid {
    base: Base,
}

#[derive(Clone, Debug, Default)]
struct Leaf {
    mid: Mid,
}

message!(Base);
message!(Mid { base: Base });
message!(Leaf { mid: Mid });

/// Уровни цепочки: 0 = Base, 1 = Mid, 2 = Leaf.
fn subscribe_level(
    hub: &Hub,
    owner: &Arc<usize>,
    level: u8,
    log: &Arc<Mutex<Vec<(usize, u8)>>>,
) {
    let id = **owner;
    let log = Arc::clone(log);
    match level {
        0 => hub.subscribe(owner, move |_: &Base| log.lock().unwrap().push((id, 0))),
        1 => hub.subscribe(owner, move |_: &Mid| log.lock().unwrap().push((id, 1))),
        _ => hub.subscribe(owner, move |_: &Leaf| log.lock().unwrap().push((id, 2))),
    };
}

fn publish_level(
    hub: &Hub,
    level: u8,
) -> usize {
    let report = match level {
        0 => hub.publish(&Base),
        1 => hub.publish(&Mid::default()),
        _ => hub.publish(&Leaf::default()),
    };
    report.unwrap().delivered
}

#[derive(Clone, Debug)]
enum Op {
    Subscribe { owner: usize, level: u8 },
    Drop { owner: usize },
    Unsubscribe { owner: usize },
    Publish { level: u8 },
}

fn op_strategy(owners: usize) -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..owners, 0u8..3).prop_map(|(owner, level)| Op::Subscribe { owner, level }),
        1 => (0..owners).prop_map(|owner| Op::Drop { owner }),
        1 => (0..owners).prop_map(|owner| Op::Unsubscribe { owner }),
        3 => (0u8..3).prop_map(|level| Op::Publish { level }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(PROPTEST_CASES))]

    /// Подписка на уровень `d` получает публикацию уровня `p` тогда и только
    /// тогда, когда `d <= p`; порядок вызова совпадает с порядком подписки.
    #[test]
    fn prop_covariance_and_order(
        levels in prop::collection::vec(0u8..3, 0..24),
        published in 0u8..3,
    ) {
        let hub = Hub::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let owners: Vec<_> = (0..levels.len()).map(Arc::new).collect();
        for (owner, level) in owners.iter().zip(&levels) {
            subscribe_level(&hub, owner, *level, &log);
        }

        let delivered = publish_level(&hub, published);

        let expected: Vec<(usize, u8)> = levels
            .iter()
            .enumerate()
            .filter(|(_, level)| **level <= published)
            .map(|(i, level)| (i, *level))
            .collect();
        prop_assert_eq!(delivered, expected.len());
        prop_assert_eq!(&*log.lock().unwrap(), &expected);
    }

    /// Один и тот же обработчик, подписанный `n` раз, вызывается `n` раз;
    /// каждая точечная отписка снимает ровно одну регистрацию.
    #[test]
    fn prop_multiplicity(n in 1usize..16, removed in 0usize..20) {
        let hub = Hub::new();
        let owner = Arc::new(0usize);
        let handler = Handler::sync(|_: &Base| {});
        for _ in 0..n {
            hub.subscribe_handler(&owner, &handler);
        }

        let mut actually_removed = 0;
        for _ in 0..removed {
            if hub.unsubscribe_handler(&owner, &handler) {
                actually_removed += 1;
            }
        }

        prop_assert_eq!(actually_removed, removed.min(n));
        prop_assert_eq!(publish_level(&hub, 0), n - removed.min(n));
        prop_assert_eq!(hub.exists_handler(&owner, &handler), n > removed);
    }

    /// Случайная последовательность операций совпадает с моделью: мёртвые и
    /// отписанные владельцы никогда не получают сообщений.
    #[test]
    fn prop_ops_match_model(ops in prop::collection::vec(op_strategy(6), 1..64)) {
        let hub = Hub::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut owners: Vec<Option<Arc<usize>>> = (0..6).map(|i| Some(Arc::new(i))).collect();
        let mut model: Vec<(usize, u8)> = Vec::new();

        for op in ops {
            match op {
                Op::Subscribe { owner, level } => {
                    if let Some(o) = &owners[owner] {
                        subscribe_level(&hub, o, level, &log);
                        model.push((owner, level));
                    }
                }
                Op::Drop { owner } => {
                    owners[owner] = None;
                    model.retain(|(o, _)| *o != owner);
                }
                Op::Unsubscribe { owner } => {
                    if let Some(o) = &owners[owner] {
                        let before = model.len();
                        model.retain(|(m, _)| *m != owner);
                        prop_assert_eq!(hub.unsubscribe(o), before - model.len());
                    }
                }
                Op::Publish { level } => {
                    log.lock().unwrap().clear();
                    let delivered = publish_level(&hub, level);
                    let expected: Vec<_> =
                        model.iter().copied().filter(|(_, l)| *l <= level).collect();
                    prop_assert_eq!(delivered, expected.len());
                    prop_assert_eq!(&*log.lock().unwrap(), &expected);
                    // После публикации мёртвые регистрации вычищены.
                    prop_assert_eq!(hub.handler_count(), model.len());
                }
            }
        }
    }
}
