#![no_main]

use std::collections::VecDeque;

use libfuzzer_sys::fuzz_target;
use lrumap_core::LruMap;

/// Checks the chain against a shadow recency list after every operation.
fn check(map: &LruMap<u8, u8>, shadow: &VecDeque<(u8, u8)>) {
    assert!(map.len() <= map.capacity());
    assert_eq!(map.len(), shadow.len());
    assert!(map.iter().eq(shadow.iter().map(|(k, v)| (k, v))));
    assert!(map.entries().eq(shadow.iter().rev().map(|(k, v)| (k, v))));
}

fn promote(shadow: &mut VecDeque<(u8, u8)>, pos: usize) {
    if let Some(entry) = shadow.remove(pos) {
        shadow.push_front(entry);
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() > 65_536 || data.is_empty() {
        return;
    }

    let capacity = usize::from(data[0] % 16) + 1;
    let Ok(mut map) = LruMap::new(capacity) else {
        return;
    };
    let mut shadow: VecDeque<(u8, u8)> = VecDeque::new();

    for chunk in data[1..].chunks(3) {
        let [op_tag, key_raw, value] = match chunk {
            [a, b, c] => [*a, *b, *c],
            _ => break,
        };
        let key = key_raw % 32;
        let pos = shadow.iter().position(|&(k, _)| k == key);

        match op_tag % 8 {
            0 | 1 => {
                let previous = map.put(key, value);
                match pos {
                    Some(p) => {
                        assert_eq!(previous, Some(shadow[p].1));
                        shadow[p].1 = value;
                        promote(&mut shadow, p);
                    }
                    None => {
                        assert_eq!(previous, None);
                        if shadow.len() == capacity {
                            shadow.pop_back();
                        }
                        shadow.push_front((key, value));
                    }
                }
            }
            2 => {
                let got = map.get(&key).copied();
                assert_eq!(got, pos.map(|p| shadow[p].1));
                if let Some(p) = pos {
                    promote(&mut shadow, p);
                }
            }
            3 => {
                assert_eq!(map.contains_key(&key), pos.is_some());
                if let Some(p) = pos {
                    promote(&mut shadow, p);
                }
            }
            4 => {
                let hit = shadow.iter().position(|&(_, v)| v == value);
                assert_eq!(map.contains_value(&value), hit.is_some());
                if let Some(p) = hit {
                    promote(&mut shadow, p);
                }
            }
            5 => {
                let removed = map.remove(&key);
                assert_eq!(removed, pos.and_then(|p| shadow.remove(p)).map(|(_, v)| v));
            }
            6 => {
                assert_eq!(map.pop_lru(), shadow.pop_back());
            }
            _ => {
                if value % 16 == 0 {
                    map.clear();
                    shadow.clear();
                } else {
                    assert_eq!(map.peek(&key).copied(), pos.map(|p| shadow[p].1));
                }
            }
        }

        check(&map, &shadow);
    }
});
