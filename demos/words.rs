//! Stores a few words and walks the ones from "w" onwards.

use btrie::{BTrie, TraversalOpts};

fn main() {
    let mut trie: BTrie<&str> = BTrie::new();

    trie.put_str("perf", Some("When things go fast"));
    trie.put_str("winter", Some("... when it's really cold"));
    trie.put_str("fall", Some("Autumn"));
    trie.put_str("win", Some("We don't want to lose... "));
    trie.put_str("fallout", Some("Mushroom cloud"));

    let mut cursor = trie.traverse(TraversalOpts::new().from("w"));
    while cursor.has_next() {
        if let Some(entry) = cursor.next() {
            println!("{}", entry.value());
        }
    }

    println!("--- backwards ---");
    for entry in trie.traverse(TraversalOpts::new().backward()) {
        println!("{} => {}", String::from_utf8_lossy(entry.key()), entry.value());
    }
}
