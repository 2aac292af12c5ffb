//! Example: Observing values saved by a layered service
//!
//! A `Profiles` service saves normalized names through a store. Its own
//! completion only says "done"; the interceptor lets us check what was saved.

use std::time::Duration;

use testkit_observe::prelude::*;

struct Store;

impl Capability for Store {
    type Value = String;
    type Error = String;

    fn perform(&self, value: String, completion: Completion<String>) {
        std::thread::spawn(move || {
            if value.is_empty() {
                completion(Err("refusing to save an empty name".to_string()));
            } else {
                completion(Ok(()));
            }
        });
    }
}

struct Profiles<S> {
    store: S,
}

impl<S: Capability<Value = String, Error = String>> Profiles<S> {
    fn rename(&self, name: &str, done: Completion<String>) {
        self.store.perform(name.trim().to_lowercase(), done);
    }
}

fn main() {
    println!("testkit-observe - Observing a layered save\n");

    let store = ObservableInterceptor::new(Store);
    let saved = store.expect_described("normalized name saved", |v| v == "grace");
    let empty = store.expect_described("empty name saved", String::is_empty);

    let profiles = Profiles { store: &store };
    profiles.rename("  Grace ", Box::new(|outcome| println!("   rename: {outcome:?}")));
    profiles.rename("   ", Box::new(|outcome| println!("   rename: {outcome:?}")));

    match wait_all([&saved], Duration::from_secs(1)) {
        Ok(()) => println!("   saved value observed: {:?}", store.last_produced()),
        Err(err) => println!("   {err}"),
    }

    // The empty rename failed in the store, so nothing was observed for it.
    if let Err(err) = wait_all([&empty], Duration::from_millis(100)) {
        println!("   {err}");
    }

    println!("\n   stats: {:?}", store.stats());
}
