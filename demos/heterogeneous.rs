//! A settings store holding values of unrelated types.
//!
//! **Run this example:** `cargo run --example heterogeneous`
//!
//! Each setting is a `PolyBox`. Values are read back by type, copied into a
//! snapshot, and moved into a tighter inline-only policy where they fit.

use std::collections::BTreeMap;

use polybox::{ContainerError, PolyBox, Shape, policy::InlineOnly, space::A8};
use rootcause::prelude::*;

#[derive(Clone, Copy, Debug)]
struct Timeout {
    millis: u64,
}

#[derive(Clone, Debug)]
struct Endpoint {
    host: String,
    port: u16,
    tls: bool,
}

type Compact = InlineOnly<A8<8>>;

fn timeout(settings: &BTreeMap<&str, PolyBox>) -> Result<u64, Report> {
    let value = settings
        .get("timeout")
        .ok_or_else(|| report!("timeout is not configured"))?;
    Ok(value.get::<Timeout>()?.millis)
}

fn main() -> Result<(), Report> {
    let mut settings: BTreeMap<&str, PolyBox> = BTreeMap::new();
    settings.insert("retries", PolyBox::new(3u8));
    settings.insert("timeout", PolyBox::new_trivial(Timeout { millis: 2500 }));
    settings.insert("name", PolyBox::new(String::from("edge-1")));
    settings.insert(
        "upstream",
        PolyBox::new(Endpoint {
            host: String::from("example.internal"),
            port: 8443,
            tls: true,
        }),
    );

    for (key, value) in &settings {
        println!("{key:>8}: {value:?}");
    }
    println!("timeout is {}ms", timeout(&settings)?);

    if let Ok(endpoint) = settings["upstream"].get::<Endpoint>() {
        let scheme = if endpoint.tls { "https" } else { "http" };
        println!("upstream is {scheme}://{}:{}", endpoint.host, endpoint.port);
    }

    // `Timeout` and `u64` share their erased operations.
    println!(
        "Timeout and u64 have the same shape: {}",
        Shape::of::<Timeout>() == Shape::of::<u64>()
    );

    // A deep copy of every setting.
    let mut snapshot = BTreeMap::new();
    for (key, value) in &settings {
        snapshot.insert(*key, value.try_clone()?);
    }
    if let Some(name) = settings.get_mut("name") {
        name.emplace(String::from("edge-2"));
    }
    println!(
        "name is {:?}, snapshot keeps {:?}",
        settings["name"].get::<String>()?,
        snapshot["name"].get::<String>()?
    );

    // Only settings of at most eight bytes move into the compact policy.
    for (key, value) in snapshot {
        match value.relocate_into::<Compact>() {
            Ok(compact) => println!("{key:>8}: compact {compact:?}"),
            Err((_, err)) => println!("{key:>8}: {err}"),
        }
    }

    let mut missing: PolyBox = PolyBox::empty();
    missing.assign_from(settings.get_mut("retries").ok_or_else(|| report!("no retries"))?);
    let err = settings["retries"].get::<u8>().unwrap_err();
    println!("after moving out: {err}");
    assert!(matches!(err, ContainerError::Empty { .. }));
    println!("moved value: {}", missing.get::<u8>()?);

    Ok(())
}
