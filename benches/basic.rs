use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sio_tty::port::termios;
use sio_tty::sys::FdSet;
use sio_tty::{BitRate, Parity, TermiosSettings};
use std::time::Duration;

pub fn bench_termios_translate(c: &mut Criterion) {
    let settings = TermiosSettings {
        speed: BitRate::from_baud(115_200).unwrap(),
        parity: Parity::Even,
        rtscts: true,
        inter_byte_timeout: Some(Duration::from_millis(200)),
        ..Default::default()
    };
    c.bench_function("termios_translate", |b| {
        b.iter(|| {
            let mut t: libc::termios = unsafe { std::mem::zeroed() };
            termios::translate(&mut t, black_box(&settings)).unwrap();
            black_box(t);
        })
    });
}

pub fn bench_fdset(c: &mut Criterion) {
    c.bench_function("fdset_insert_scan", |b| {
        b.iter(|| {
            let mut set = FdSet::new();
            for fd in (0..512).step_by(7) {
                set.insert(black_box(fd));
            }
            black_box(set.iter().count());
            black_box(set.highest());
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(300))
        .measurement_time(Duration::from_secs(2));
    targets = bench_termios_translate, bench_fdset
}
criterion_main!(benches);
