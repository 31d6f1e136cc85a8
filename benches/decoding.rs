use criterion::{criterion_group, criterion_main, Criterion};
use std::path::Path;

use lookout::notify::EmbedBuilder;
use lookout::parser::{mime, stamps};

fn fixture() -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("task_created.eml");
    std::fs::read(path).unwrap()
}

fn bench_decode(c: &mut Criterion) {
    let raw = fixture();
    c.bench_function("decode_task_mail", |b| b.iter(|| mime::decode(&raw).unwrap()));
}

fn bench_find_stamp(c: &mut Criterion) {
    let mail = mime::decode(&fixture()).unwrap();
    let header = mail.header("X-Phabricator-Stamps").unwrap().to_string();
    c.bench_function("find_stamp_priority", |b| {
        b.iter(|| stamps::find_stamp("task-priority", &header))
    });
}

fn bench_build_embed(c: &mut Criterion) {
    let mail = mime::decode(&fixture()).unwrap();
    let header = mail.header("X-Phabricator-Stamps").unwrap().to_string();
    let builder = EmbedBuilder::new("https://phabricator.wikimedia.org").unwrap();
    c.bench_function("build_embed", |b| b.iter(|| builder.build(&mail, &header)));
}

criterion_group!(benches, bench_decode, bench_find_stamp, bench_build_embed);
criterion_main!(benches);
