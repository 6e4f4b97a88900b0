//! Dispatch and timer benchmarks

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use pf_core::{MachineConfig, NullHardware, SwitchState, Timestamp};
use pf_engine::{Event, Flow, HandlerResult, HandlerTable, Machine, Mode, ModeCx, ModeSettings};

struct Counter {
    hits: u64,
}

impl Mode for Counter {
    fn handlers(&self) -> HandlerTable<Self> {
        HandlerTable::new()
            .on("sw_slingL_active", Self::hit)
            .on("evt_tick", Self::hit)
    }
}

impl Counter {
    fn hit(&mut self, cx: &mut ModeCx<'_, Self>, _: &Event) -> HandlerResult {
        self.hits += 1;
        if self.hits % 4 == 0 {
            cx.delay("echo", 0.0, |mode, _| {
                mode.hits += 1;
                Ok(())
            });
        }
        Ok(Flow::Continue)
    }
}

fn machine(modes: usize) -> Machine {
    let config = MachineConfig {
        switches: vec!["slingL".into()],
        ..MachineConfig::default()
    };
    let mut machine = Machine::new(config, Box::new(NullHardware)).unwrap();
    for i in 0..modes {
        let id = machine
            .register(ModeSettings::new(format!("m{}", i), i as i32), Counter { hits: 0 })
            .unwrap();
        machine.add_mode(id).unwrap();
    }
    machine
}

fn bench_named_dispatch(c: &mut Criterion) {
    let mut machine = machine(16);
    c.bench_function("dispatch_named_16_modes", |b| {
        b.iter(|| black_box(machine.send_event(black_box("evt_tick"))))
    });
}

fn bench_switch_and_tick(c: &mut Criterion) {
    let mut machine = machine(16);
    let mut now = 0u64;
    c.bench_function("switch_pair_and_tick_16_modes", |b| {
        b.iter(|| {
            now += 16;
            machine
                .on_switch_event("slingL", SwitchState::Active, Timestamp(now))
                .unwrap();
            machine
                .on_switch_event("slingL", SwitchState::Inactive, Timestamp(now + 1))
                .unwrap();
            black_box(machine.tick(Timestamp(now + 2)));
        })
    });
}

criterion_group!(benches, bench_named_dispatch, bench_switch_and_tick);
criterion_main!(benches);
