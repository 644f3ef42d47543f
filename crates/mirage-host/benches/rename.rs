//! Benchmarks for the renaming hot path: slice rotation, epoch-batched
//! reclamation, and view cache lookups.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mirage_buffer::{
    BufferCreateInfo, BufferTracker, BufferUsage, BufferView, BufferViewInfo, Format, MemoryFlags,
    VirtualBuffer,
};
use mirage_host::HostDevice;

fn buffer_with(device: &Arc<HostDevice>, size: u64, usage: BufferUsage) -> Arc<VirtualBuffer> {
    let info = BufferCreateInfo { size, usage };
    let flags = MemoryFlags::HOST_VISIBLE | MemoryFlags::HOST_COHERENT;
    Arc::new(VirtualBuffer::new(device.clone(), info, flags).unwrap())
}

/// Steady-state rotation: pop a slice, swap it in, reclaim the old one.
/// After warmup every slice comes from the recirculating pool.
fn bench_rename_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("rename_cycle");

    for size in [256u64, 4096, 65536] {
        group.throughput(Throughput::Bytes(size));
        group.bench_with_input(BenchmarkId::new("recycled", size), &size, |b, &size| {
            let device = Arc::new(HostDevice::new());
            let buffer = buffer_with(&device, size, BufferUsage::VERTEX);
            b.iter(|| {
                let fresh = buffer.alloc_physical_slice().unwrap();
                let prev = buffer.rename(black_box(fresh));
                buffer.free_physical_slice(prev);
            })
        });
    }

    group.finish();
}

/// Rotation with reclamation batched into tracker epochs, the way a
/// submission queue retires slices after completion.
fn bench_tracker_epochs(c: &mut Criterion) {
    let mut group = c.benchmark_group("tracker_epochs");

    for batch in [1usize, 8, 64] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("batch", batch), &batch, |b, &batch| {
            let device = Arc::new(HostDevice::new());
            let buffer = buffer_with(&device, 4096, BufferUsage::VERTEX);
            let mut tracker = BufferTracker::new();
            b.iter(|| {
                for _ in 0..batch {
                    let fresh = buffer.alloc_physical_slice().unwrap();
                    let prev = buffer.rename(fresh);
                    tracker.free_buffer_slice(Arc::clone(&buffer), prev);
                }
                tracker.reset();
            })
        });
    }

    group.finish();
}

/// View maintenance when the backing holds still versus when every
/// iteration rotates it. Rotation ping-pongs between two pooled slices,
/// so the rotated case measures the cache-hit path.
fn bench_view_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("view_update");

    let device = Arc::new(HostDevice::new());
    let buffer = buffer_with(&device, 4096, BufferUsage::VERTEX | BufferUsage::UNIFORM_TEXEL);
    let info = BufferViewInfo { format: Format::R32Sfloat, range_offset: 0, range_length: 4096 };
    let view = BufferView::new(device.clone(), Arc::clone(&buffer), info).unwrap();

    group.bench_function("stable_backing", |b| {
        b.iter(|| {
            view.update_view().unwrap();
            black_box(view.handle())
        })
    });

    group.bench_function("rotated_backing", |b| {
        b.iter(|| {
            let fresh = buffer.alloc_physical_slice().unwrap();
            let prev = buffer.rename(fresh);
            buffer.free_physical_slice(prev);
            view.update_view().unwrap();
            black_box(view.handle())
        })
    });

    group.finish();
}

/// Read-side snapshot operations that sit on descriptor bind paths.
fn bench_reader_snapshots(c: &mut Criterion) {
    let mut group = c.benchmark_group("reader_snapshots");

    let device = Arc::new(HostDevice::new());
    let buffer = buffer_with(&device, 4096, BufferUsage::VERTEX);

    group.bench_function("slice_handle", |b| b.iter(|| black_box(buffer.slice_handle())));
    group.bench_function("descriptor", |b| b.iter(|| black_box(buffer.descriptor(0, 4096))));
    group.bench_function("dynamic_offset", |b| b.iter(|| black_box(buffer.dynamic_offset(0))));

    group.finish();
}

criterion_group!(
    benches,
    bench_rename_cycle,
    bench_tracker_epochs,
    bench_view_update,
    bench_reader_snapshots
);
criterion_main!(benches);
