use criterion::{BatchSize, Criterion, Throughput};
use embedded_hal::delay::DelayNs;
use libcellular::network::link::{Bridge, frame};
use libcellular::network::{Read, Write};
use libcellular::time::Clock;
use std::collections::VecDeque;

/// Port that acknowledges every command frame and replays queued bytes.
struct LoopbackPort {
    rx: VecDeque<u8>,
}

impl Read for LoopbackPort {
    type Error = ();

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for LoopbackPort {
    type Error = ();

    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        if buf.len() >= 4 && buf[0] == frame::LEAD {
            self.rx.extend(frame::ack(buf[2], frame::ACK_OK));
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
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

pub fn bench_transmit_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");
    let payload = [0x5Au8; 730 * 2];
    group.throughput(Throughput::Bytes(payload.len() as u64));
    group.bench_function("transmit", |b| {
        b.iter(|| frame::transmit(1, std::hint::black_box(&payload)).unwrap())
    });
    group.finish();
}

pub fn bench_decode_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");
    let encoded = frame::receive(1, &[0x41u8; 512]).unwrap();
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("decode", |b| {
        b.iter(|| frame::decode(std::hint::black_box(&encoded)))
    });
    group.finish();
}

pub fn bench_bridge_read_line(c: &mut Criterion) {
    let mut group = c.benchmark_group("bridge");
    let reply = b"+CIPRXGET: 3,4,0\r\n200200FF\r\n\r\nOK\r\n";
    group.throughput(Throughput::Bytes(reply.len() as u64));
    group.bench_function("read_line", |b| {
        b.iter_batched_ref(
            || {
                let mut port = LoopbackPort { rx: VecDeque::new() };
                port.rx.extend(frame::receive(1, reply).unwrap());
                Bridge::new(port, VirtualClock::default(), 1)
            },
            |bridge| {
                let mut line = [0u8; 64];
                while bridge.read_line(&mut line).unwrap() > 0 {}
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}
