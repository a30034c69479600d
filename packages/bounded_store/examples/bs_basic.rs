//! Basic usage of the `bounded_store` crate:
//!
//! * Creating a store of a fixed length.
//! * Reading and modifying elements.
//! * Resizing, which always builds a new block.
//! * Moving the contents out of a store.

use bounded_store::BoundedStore;

fn main() {
    let mut names = BoundedStore::from_fn(3, |index| format!("guest {index}")).unwrap();

    println!("Store holds {} names: {:?}", names.len(), names.as_slice());

    // Elements are accessed like a slice, there is no spare capacity to push into.
    names[0] = "Alice".to_string();
    names[1].push_str(" (late)");
    println!("After editing: {:?}", names.as_slice());

    // Resizing throws the old contents away and builds a fresh block of default values.
    names.resize(2).unwrap();
    println!("After resizing: {:?}", names.as_slice());

    // Taking the contents leaves an empty store behind without copying anything.
    let taken = names.take();
    println!(
        "Taken store has {} names, original is now empty: {}",
        taken.len(),
        names.is_empty()
    );
}
