use criterion::{criterion_group, criterion_main};

mod network;

criterion_group!(
    benches,
    network::link::bench_transmit_frame,
    network::link::bench_decode_frame,
    network::link::bench_bridge_read_line,
    network::application::mqtt::client::bench_encode_publish,
    network::application::mqtt::client::bench_publish_qos0,
    network::application::mqtt::client::bench_publish_qos1
);
criterion_main!(benches);
