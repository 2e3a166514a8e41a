// Merkle commitment benchmarks for the Covenant ledger core.
//
// Covers transaction id computation at several output counts, building a
// filtered view that reveals one command, and verifying that view.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde::{Deserialize, Serialize};

use covenant_protocol::crypto::hash::{merkle_root, SecureHash};
use covenant_protocol::crypto::keys::Keypair;
use covenant_protocol::identity::AbstractParty;
use covenant_protocol::ledger::{
    ContractState, FilteredTransaction, TransactionBuilder, TxComponent, WireTransaction,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Ticket {
    serial: u64,
    memo: String,
}

impl ContractState for Ticket {
    fn participants(&self) -> Vec<AbstractParty> {
        Vec::new()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
enum Action {
    Issue,
    Quote { rate_bps: u32 },
}

fn sample_tx(outputs: u64) -> WireTransaction<Ticket, Action> {
    let issuer = Keypair::generate().public_key();
    let oracle = Keypair::generate().public_key();
    let mut builder = TransactionBuilder::new(Keypair::generate().public_key())
        .add_command(Action::Issue, [issuer])
        .add_command(Action::Quote { rate_bps: 20_000 }, [issuer, oracle]);
    for serial in 0..outputs {
        builder = builder.add_output_state(Ticket {
            serial,
            memo: format!("ticket {}", serial),
        });
    }
    match builder.build() {
        Ok(wtx) => wtx,
        Err(e) => panic!("bench transaction failed to build: {}", e),
    }
}

fn bench_merkle_root(c: &mut Criterion) {
    let mut group = c.benchmark_group("merkle/root");
    for size in [2usize, 64, 1024] {
        let leaves: Vec<SecureHash> = (0..size).map(|i| SecureHash::of(&i.to_le_bytes())).collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &leaves, |b, leaves| {
            b.iter(|| merkle_root(leaves));
        });
    }
    group.finish();
}

fn bench_transaction_id(c: &mut Criterion) {
    let mut group = c.benchmark_group("merkle/check_id");
    for outputs in [1u64, 16, 128] {
        let wtx = sample_tx(outputs);
        group.bench_with_input(BenchmarkId::from_parameter(outputs), &wtx, |b, wtx| {
            b.iter(|| wtx.check_id());
        });
    }
    group.finish();
}

fn bench_filtered_view(c: &mut Criterion) {
    let wtx = sample_tx(16);
    let reveal_quote = |component: TxComponent<'_, Ticket, Action>| {
        matches!(component, TxComponent::Command(cmd) if matches!(cmd.value, Action::Quote { .. }))
    };

    c.bench_function("merkle/filtered_build", |b| {
        b.iter(|| FilteredTransaction::build(&wtx, reveal_quote));
    });

    let ftx = match FilteredTransaction::build(&wtx, reveal_quote) {
        Ok(ftx) => ftx,
        Err(e) => panic!("filtered view failed to build: {}", e),
    };
    c.bench_function("merkle/filtered_verify", |b| {
        b.iter(|| ftx.verify());
    });
}

criterion_group!(benches, bench_merkle_root, bench_transaction_id, bench_filtered_view);
criterion_main!(benches);
