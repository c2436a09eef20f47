#![forbid(unsafe_code)]

use std::error::Error;

use cipher::{ClearCiphertext, ClearKey, Encryptor};
use engine::{ArchetypeEngine, EngineConfig};
use keys::KeyStore;
use oracle_client::DevOracle;

const ARCHETYPES: [(&str, [u64; 3]); 3] = [
    ("retail", [40, 12, 5]),
    ("wholesale", [5_000, 3, 20]),
    ("high-risk", [900, 40, 95]),
];

const TRANSACTIONS: [[u64; 3]; 8] = [
    [35, 10, 4],
    [4_200, 2, 18],
    [55, 15, 6],
    [880, 45, 90],
    [6_100, 4, 25],
    [20, 8, 3],
    [1_050, 38, 99],
    [47, 11, 7],
];

fn main() -> Result<(), Box<dyn Error>> {
    let client_key = ClearKey::generate();
    let oracle: DevOracle<ClearCiphertext, _> =
        DevOracle::new(client_key.clone(), KeyStore::new_dev_keystore(1));
    let authority = oracle.authority();
    let initial = ARCHETYPES
        .iter()
        .map(|(_, c)| client_key.encrypt_vector(c[0], c[1], c[2]))
        .collect();

    let mut engine = ArchetypeEngine::new(
        client_key.backend(),
        oracle,
        authority,
        EngineConfig::production(),
        initial,
    )?;

    for tx in TRANSACTIONS {
        let id = engine.ingest(client_key.encrypt_vector(tx[0], tx[1], tx[2]))?;
        println!("ingested transaction {id}");
    }

    let mut requests = Vec::new();
    for cluster_id in 0..engine.cluster_count() {
        let cluster_id = u32::try_from(cluster_id)?;
        requests.push(engine.request_decryption(cluster_id)?);
    }
    println!("opened {} decryption requests", requests.len());

    for response in engine.oracle_mut().drain() {
        let response = response?;
        let reveal =
            engine.on_decrypted(response.request_id, &response.cleartext, &response.proof)?;
        let name = ARCHETYPES
            .get(reveal.cluster_id as usize)
            .map(|(name, _)| *name)
            .unwrap_or("unknown");
        println!(
            "{name}: members={} centroid=({}, {}, {}) digest={}",
            reveal.member_count,
            reveal.centroid_amount,
            reveal.centroid_frequency,
            reveal.centroid_risk,
            hex::encode(reveal.cleartext_digest)
        );
    }

    engine.events().validate_chain()?;
    println!("event chain ok: {} events", engine.events().total_appended());
    Ok(())
}
