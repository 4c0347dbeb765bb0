use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use lib_distclus::abi;
use project_tests::*;
use serde_json::json;
use tokio::task::JoinSet;
use tokio::time::sleep;

const CLIENTS: usize = 8;
const ROUNDS: usize = 200;

#[tokio::main]
/// # Concurrent Clients
///
/// Simulates several foreign callers sharing the library:
/// 1.  Every client creates its own k-means instance and starts a background run.
/// 2.  Clients push and predict in a loop while their runs iterate.
/// 3.  Half of them close their instance midway and keep reading from it.
/// 4.  Every instance is released and its descriptor must become unknown.
async fn main() -> Result<()> {
    let code = abi::oc_init();
    if code != OC_SUCCESS {
        bail!("oc_init returned {}", code);
    }

    let started = Instant::now();
    let mut clients = JoinSet::new();
    for client in 0..CLIENTS {
        clients.spawn_blocking(move || run_client(client));
    }

    let mut descrs = Vec::new();
    while let Some(joined) = clients.join_next().await {
        descrs.push(joined??);
    }

    // Give any stray background step a chance to show up.
    sleep(Duration::from_millis(50)).await;

    descrs.sort_unstable();
    descrs.dedup();
    if descrs.len() != CLIENTS {
        bail!("expected {} distinct descriptors got {}", CLIENTS, descrs.len());
    }
    for descr in &descrs {
        if figure(*descr, F_ITERATIONS).0 != OC_ERR_UNKNOWN_DESCRIPTOR {
            bail!("descriptor {} still registered after free", descr);
        }
    }

    println!("{} clients x {} rounds in {:?}", CLIENTS, ROUNDS, started.elapsed());
    Ok(())
}

fn run_client(client: usize) -> Result<i32> {
    let elemts = make_elements();
    let conf = conf(json!({"k": 2, "iter": 30, "seed": SEED + client as u64, "iter_freq_ms": 1}));
    let (code, descr) = create(O_KMEANS, S_REAL, Some(&conf), &elemts, I_KMEANSPP);
    if code != OC_SUCCESS {
        bail!("client {}: create returned {}", client, code);
    }
    if abi::oc_run(descr, 1) != OC_SUCCESS {
        bail!("client {}: background run refused", client);
    }

    let closes = client % 2 == 0;
    for round in 0..ROUNDS {
        if closes && round == ROUNDS / 2 {
            abi::oc_close(descr);
        }
        push(descr, &elemts[round % elemts.len()..][..1]);
        let (code, labels) = predict(descr, &elemts);
        match code {
            OC_SUCCESS if labels.len() == elemts.len() => {}
            // centroids not seeded yet
            OC_ERR_OPERATION if labels.is_empty() => {}
            _ => bail!("client {}: predict returned {} with {} labels", client, code, labels.len()),
        }
    }

    let (_, pushed) = figure(descr, F_PUSHED_DATA);
    let expected = if closes { 20 + ROUNDS / 2 } else { 20 + ROUNDS };
    if pushed != expected as f64 {
        bail!("client {}: expected {} pushed got {}", client, expected, pushed);
    }

    abi::oc_free(descr);
    Ok(descr)
}
