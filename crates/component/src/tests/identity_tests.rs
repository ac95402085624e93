use super::*;

#[test]
fn issues_increasing_unique_keys() {
    let keys = KeyGenerator::new();
    let a = keys.issue();
    let b = keys.issue();
    let c = keys.issue();
    assert_ne!(a, b);
    assert_ne!(b, c);
    assert!(a < b && b < c);
}

#[test]
fn clones_share_one_counter() {
    let keys = KeyGenerator::new();
    let other = keys.clone();
    let a = keys.issue();
    let b = other.issue();
    assert_ne!(a, b);
    assert_eq!(keys.peek(), 2);
}

#[test]
fn starting_offset_and_display() {
    let keys = KeyGenerator::starting_at(40);
    assert_eq!(keys.peek(), 40);
    assert_eq!(keys.issue().to_string(), "c40");
    assert_eq!(keys.issue(), ComponentKey(41));
}

#[test]
fn concurrent_issue_never_repeats() {
    let keys = KeyGenerator::new();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let keys = keys.clone();
            std::thread::spawn(move || (0..250).map(|_| keys.issue()).collect::<Vec<_>>())
        })
        .collect();

    let mut all: Vec<ComponentKey> = handles
        .into_iter()
        .flat_map(|handle| handle.join().expect("join"))
        .collect();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 1000);
}
