use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use lookup_values::{
    Declaration, HostType, LookupError, LookupRegistry, LookupStore, MemoryStore, Settings,
    SqliteStore,
};
use rusqlite::Connection;

fn connection() -> Arc<Mutex<Connection>> {
    Settings::default().open_connection().expect("connection")
}

#[test]
fn registration_preloads_every_entry() {
    let registry = LookupRegistry::new();
    let texts: Vec<String> = (1..=25).map(|i| format!("kind {}", i)).collect();
    let cache = registry
        .register("car_kind", None, |name| MemoryStore::with_entries(name, &texts))
        .expect("register");
    assert_eq!(cache.len().unwrap(), 25);
    let store = registry.vocabulary("car_kind").unwrap().expect("vocabulary").store();
    assert_eq!(cache.entries().unwrap(), store.all_entries().unwrap());
    // every preloaded pair answers from the cache alone
    for entry in store.all_entries().unwrap() {
        assert_eq!(cache.key_for(entry.text()).unwrap(), Some(entry.key()));
    }
}

#[test]
fn sqlite_vocabulary_is_preloaded_by_a_fresh_registry() {
    let db = connection();
    {
        let registry = LookupRegistry::new();
        let cache = registry
            .register("car_color", None, |name| SqliteStore::provision(Arc::clone(&db), name))
            .expect("register");
        for color in ["Red", "Black", "Yellow"] {
            cache.resolve_or_create(color).expect("color");
        }
    }
    let registry = LookupRegistry::new();
    let cache = registry
        .register("car_color", None, |name| SqliteStore::provision(Arc::clone(&db), name))
        .expect("register again");
    assert_eq!(cache.len().unwrap(), 3);
    assert_eq!(cache.key_for("Black").unwrap(), Some(2));
    assert_eq!(cache.resolve_or_create("Yellow").unwrap(), 3);
    assert_eq!(registry.vocabulary("car_color").unwrap().unwrap().count().unwrap(), 3);
}

#[test]
fn caches_without_preload_heal_lazily() {
    let registry = LookupRegistry::without_preload();
    let cache = registry
        .register("car_kind", None, |name| {
            MemoryStore::with_entries(name, ["Compact", "Sports"])
        })
        .expect("register");
    assert!(cache.is_empty().unwrap());
    assert_eq!(cache.key_for("Sports").unwrap(), None);
    assert_eq!(cache.text_for(2).unwrap().as_deref(), Some("Sports"));
    assert_eq!(cache.key_for("Sports").unwrap(), Some(2));
    // resolving known text reuses the stored key
    assert_eq!(cache.resolve_or_create("Compact").unwrap(), 1);
    assert_eq!(cache.store().count().unwrap(), 2);
    assert_eq!(cache.refresh().unwrap(), 2);
}

#[test]
fn settings_choose_preload() {
    let settings = Settings {
        preload: false,
        ..Settings::default()
    };
    let cache = settings
        .registry()
        .register("car_kind", None, |name| MemoryStore::with_entries(name, ["Compact"]))
        .expect("register");
    assert!(cache.is_empty().unwrap());
    let cache = Settings::default()
        .registry()
        .register("car_kind", None, |name| MemoryStore::with_entries(name, ["Compact"]))
        .expect("register");
    assert_eq!(cache.len().unwrap(), 1);
}

#[test]
fn one_vocabulary_shared_by_host_types() {
    let registry = Arc::new(LookupRegistry::new());
    let provisioned = AtomicUsize::new(0);
    let provision = |name: &str| {
        provisioned.fetch_add(1, Ordering::SeqCst);
        Ok(MemoryStore::new(name))
    };
    let mut car = HostType::new("car").expect("car");
    let mut truck = HostType::new("truck").expect("truck");
    car.declare(&registry, Declaration::new("vehicle_color").exposed_as("color"), provision)
        .expect("car color");
    truck
        .declare(&registry, Declaration::new("vehicle_color").exposed_as("paint"), provision)
        .expect("truck paint");
    assert_eq!(provisioned.load(Ordering::SeqCst), 1);

    let car_cache = car.binding("color").expect("binding").cache().expect("cache");
    let truck_cache = truck.binding("paint").expect("binding").cache().expect("cache");
    assert!(Arc::ptr_eq(&car_cache, &truck_cache));

    let mut bimba = lookup_values::Record::new();
    let mut hauler = lookup_values::Record::new();
    let red = car.set_text(&mut bimba, "color", "Red").expect("red");
    assert_eq!(truck.set_text(&mut hauler, "paint", "Red").unwrap(), red);
    assert_eq!(hauler.get("paint_key").as_integer(), Some(red));

    let vocabulary = registry.vocabulary("vehicle_color").unwrap().expect("vocabulary");
    assert_eq!(vocabulary.referrers().unwrap(), vec!["car", "truck"]);
    assert_eq!(vocabulary.count().unwrap(), 1);
    assert_eq!(registry.names().unwrap(), vec!["vehicle_color"]);
}

#[test]
fn unregister_leaves_the_store_alone() {
    let db = connection();
    let registry = LookupRegistry::new();
    let cache = registry
        .register("car_kind", None, |name| SqliteStore::provision(Arc::clone(&db), name))
        .expect("register");
    cache.resolve_or_create("Compact").expect("compact");
    let removed = registry.unregister("car_kind").unwrap().expect("removed");
    assert_eq!(removed.name(), "car_kind");
    assert!(registry.lookup("car_kind").unwrap().is_none());
    assert!(registry.is_empty().unwrap());
    assert!(registry.unregister("car_kind").unwrap().is_none());

    let cache = registry
        .register("car_kind", None, |name| SqliteStore::provision(Arc::clone(&db), name))
        .expect("register again");
    assert_eq!(cache.key_for("Compact").unwrap(), Some(1));
}

#[test]
fn concurrent_registration_provisions_once() {
    let registry = LookupRegistry::new();
    let provisioned = AtomicUsize::new(0);
    let caches: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    registry
                        .register("car_kind", None, |name| {
                            provisioned.fetch_add(1, Ordering::SeqCst);
                            MemoryStore::with_entries(name, ["Compact"])
                        })
                        .expect("register")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread"))
            .collect()
    });
    assert_eq!(provisioned.load(Ordering::SeqCst), 1);
    assert!(caches.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(registry.len().unwrap(), 1);
}

#[test]
fn delete_all_empties_store_and_cache() {
    let registry = LookupRegistry::new();
    let cache = registry
        .register("car_kind", None, |name| {
            MemoryStore::with_entries(name, ["Compact", "Sports"])
        })
        .expect("register");
    let vocabulary = registry.vocabulary("car_kind").unwrap().expect("vocabulary");
    vocabulary.delete_all().expect("delete");
    assert_eq!(vocabulary.count().unwrap(), 0);
    assert!(cache.is_empty().unwrap());
    assert_eq!(cache.key_for("Compact").unwrap(), None);
    // keys are not handed out again
    assert_eq!(cache.resolve_or_create("Compact").unwrap(), 3);
}

#[test]
fn invalid_names_are_rejected() {
    let registry = Arc::new(LookupRegistry::new());
    let err = registry
        .register("car kind", None, |name| Ok(MemoryStore::new(name)))
        .unwrap_err();
    assert!(matches!(err, LookupError::InvalidName(_)));
    assert!(registry.is_empty().unwrap());

    let mut car = HostType::new("car").expect("car");
    let err = car
        .declare(
            &registry,
            Declaration::new("car_kind").exposed_as("kind; drop"),
            |name| Ok(MemoryStore::new(name)),
        )
        .unwrap_err();
    assert!(matches!(err, LookupError::InvalidName(_)));
    assert!(HostType::new("").is_err());
}

#[test]
fn lookups_proceed_while_a_registration_provisions() {
    let registry = LookupRegistry::new();
    registry
        .register("car_color", None, |name| MemoryStore::with_entries(name, ["Red"]))
        .expect("car color");
    let (started_tx, started_rx) = mpsc::channel();
    let (go_tx, go_rx) = mpsc::channel::<()>();
    thread::scope(|s| {
        let slow = s.spawn(|| {
            registry.register("car_kind", None, move |name| {
                started_tx.send(()).expect("started");
                go_rx
                    .recv_timeout(Duration::from_secs(5))
                    .map_err(|_| LookupError::StoreUnavailable("provision timed out".to_string()))?;
                Ok(MemoryStore::new(name))
            })
        });
        started_rx.recv().expect("provision started");
        // car_kind is still provisioning here
        let colors = registry.lookup("car_color").unwrap().expect("car color");
        assert_eq!(colors.key_for("Red").unwrap(), Some(1));
        assert!(registry.lookup("car_kind").unwrap().is_none());
        let _ = go_tx.send(());
        slow.join().expect("thread").expect("car kind");
    });
    assert_eq!(registry.names().unwrap(), vec!["car_color", "car_kind"]);
}
