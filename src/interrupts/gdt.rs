//! Flat 64-bit segments plus a TSS whose only job is the double fault stack.
//!
//! Task stacks live in the task table and have no guard page, so a
//! double fault is always taken on the separate IST stack below.

use spin::Lazy;
use x86_64::instructions::segmentation::{Segment, CS, DS, ES, SS};
use x86_64::instructions::tables::load_tss;
use x86_64::structures::gdt::{Descriptor, GlobalDescriptorTable, SegmentSelector};
use x86_64::structures::tss::TaskStateSegment;
use x86_64::VirtAddr;

pub const DOUBLE_FAULT_IST_INDEX: u16 = 0;

const FAULT_STACK_SIZE: usize = 16 * 1024;

#[repr(C, align(16))]
struct FaultStack([u8; FAULT_STACK_SIZE]);

static mut DOUBLE_FAULT_STACK: FaultStack = FaultStack([0; FAULT_STACK_SIZE]);

fn fault_stack_top() -> VirtAddr {
    let base = VirtAddr::from_ptr(core::ptr::addr_of!(DOUBLE_FAULT_STACK));
    base + FAULT_STACK_SIZE as u64
}

static TSS: Lazy<TaskStateSegment> = Lazy::new(|| {
    let mut tss = TaskStateSegment::new();
    tss.interrupt_stack_table[DOUBLE_FAULT_IST_INDEX as usize] = fault_stack_top();
    tss
});

struct KernelSegments {
    code: SegmentSelector,
    data: SegmentSelector,
    tss: SegmentSelector,
}

static GDT: Lazy<(GlobalDescriptorTable, KernelSegments)> = Lazy::new(|| {
    let mut gdt = GlobalDescriptorTable::new();
    let segments = KernelSegments {
        code: gdt.append(Descriptor::kernel_code_segment()),
        data: gdt.append(Descriptor::kernel_data_segment()),
        tss: gdt.append(Descriptor::tss_segment(&TSS)),
    };
    (gdt, segments)
});

pub fn init() {
    let (gdt, segments) = &*GDT;
    gdt.load();

    // SAFETY: the selectors come from the table that was just loaded.
    unsafe {
        CS::set_reg(segments.code);
        DS::set_reg(segments.data);
        ES::set_reg(segments.data);
        SS::set_reg(segments.data);
        load_tss(segments.tss);
    }
}
