use criterion::{BatchSize, Criterion, Throughput};
use embedded_hal::delay::DelayNs;
use libcellular::network::Socket;
use libcellular::network::application::mqtt::packet::{self, Encode, Publish};
use libcellular::network::application::mqtt::{Client, Options, QoS};
use libcellular::time::Clock;
use rand::rngs::mock::StepRng;
use std::collections::VecDeque;

/// In-memory broker: accepts every CONNECT and acknowledges QoS 1 PUBLISH.
#[derive(Default)]
struct LoopbackBroker {
    rx: VecDeque<u8>,
    connected: bool,
}

impl LoopbackBroker {
    fn answer(&mut self, data: &[u8]) {
        match data[0] & 0xF0 {
            packet::CONNECT => self.rx.extend([0x20, 0x02, 0x00, 0x00]),
            packet::PUBLISH if data[0] & 0x06 == 0x02 => {
                let (_, used) = packet::decode_remaining_length(&data[1..]).unwrap();
                let topic = 1 + used;
                let topic_len = usize::from(u16::from_be_bytes([data[topic], data[topic + 1]]));
                let id = topic + 2 + topic_len;
                self.rx.extend([0x40, 0x02, data[id], data[id + 1]]);
            }
            _ => {}
        }
    }
}

impl Socket for LoopbackBroker {
    type Error = ();

    fn connect(&mut self, _host: &str, _port: u16) -> Result<(), ()> {
        self.connected = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), ()> {
        self.connected = false;
        Ok(())
    }

    fn connected(&mut self) -> Result<bool, ()> {
        Ok(self.connected)
    }

    fn send(&mut self, data: &[u8]) -> Result<(), ()> {
        self.answer(data);
        Ok(())
    }

    fn available(&mut self) -> Result<usize, ()> {
        Ok(self.rx.len())
    }

    fn receive(&mut self, buf: &mut [u8]) -> Result<usize, ()> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

#[derive(Default)]
struct VirtualClock {
    now_ms: u64,
}

impl DelayNs for VirtualClock {
    fn delay_ns(&mut self, ns: u32) {
        self.now_ms += u64::from(ns / 1_000_000);
    }
}

impl Clock for VirtualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }
}

fn setup_client(client_id: &'static str) -> Client<'static, LoopbackBroker, VirtualClock, StepRng> {
    let mut options = Options::new("broker.example.com");
    options.client_id = Some(client_id);
    let mut client = Client::new(
        LoopbackBroker::default(),
        VirtualClock::default(),
        StepRng::new(1, 1),
        options,
    )
    .expect("Failed to create client");
    assert!(client.connect().expect("Failed to connect"));
    client
}

pub fn bench_encode_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let payload = [0x42u8; 512];
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("publish", |b| {
        b.iter(|| {
            Publish {
                topic: "sensors/air",
                payload: std::hint::black_box(&payload),
                qos: QoS::AtLeastOnce,
                retain: false,
                packet_id: 7,
            }
            .encode()
            .unwrap()
        })
    });
    group.finish();
}

pub fn bench_publish_qos0(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");
    let payload = b"{\"pm25\":12,\"pm10\":20}";
    group.throughput(Throughput::Bytes(payload.len() as u64 * 50));
    group.bench_function("qos0", |b| {
        b.iter_batched_ref(
            || setup_client("libcellular-bench-qos0"),
            |client| {
                for _ in 0..50 {
                    client
                        .publish("sensors/air", payload, QoS::AtMostOnce, false)
                        .expect("Failed to publish");
                }
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

pub fn bench_publish_qos1(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");
    let payload = b"{\"pm25\":12,\"pm10\":20}";
    group.throughput(Throughput::Bytes(payload.len() as u64 * 50));
    group.bench_function("qos1", |b| {
        b.iter_batched_ref(
            || setup_client("libcellular-bench-qos1"),
            |client| {
                for _ in 0..50 {
                    let acked = client
                        .publish("sensors/air", payload, QoS::AtLeastOnce, false)
                        .expect("Failed to publish");
                    assert!(acked);
                }
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}
