use std::io::Read;
use std::ptr;

use cpualloc::{allocate, deallocate};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change as arenas grow.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

unsafe fn print_alloc(label: &str, size: usize, addr: *mut u8) {
  println!("[{label}] requested {size} bytes, address = {addr:?}");
}

fn main() {
  println!("PID = {}, logical CPUs = {}", std::process::id(), std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1));
  block_until_enter_pressed();

  unsafe {
    // --------------------------------------------------------------------
    // 1) Allocate space for a u32.
    // --------------------------------------------------------------------
    let first_block = allocate(4);
    print_alloc("1", 4, first_block);

    let first_ptr = first_block as *mut u32;
    first_ptr.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_ptr.read());

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Allocate 12 odd-sized bytes.
    // --------------------------------------------------------------------
    let second_block = allocate(12);
    print_alloc("2", 12, second_block);
    ptr::write_bytes(second_block, 0xAB, 12);
    println!("[2] Initialized second block with 0xAB");

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Allocate a u64 and confirm word alignment.
    // --------------------------------------------------------------------
    let third_block = allocate(8);
    print_alloc("3", 8, third_block);

    let third_ptr = third_block as *mut u64;
    third_ptr.write(0x1122334455667788);
    println!("[3] Value written = 0x{:X}", third_ptr.read());
    println!("[3] addr % word size = {}", (third_block as usize) % std::mem::size_of::<usize>());

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Deallocate the first block, then allocate a smaller one to see
    //    whether the bitmap scan reuses the freed run.
    // --------------------------------------------------------------------
    deallocate(first_block);
    println!("\n[4] Deallocated first_block at {first_block:?}");

    let fifth_block = allocate(2);
    print_alloc("4", 2, fifth_block);
    println!(
      "[4] fifth_block == first_block? {}",
      if fifth_block == first_block { "yes, reused the freed run" } else { "no, allocated elsewhere" }
    );

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Allocate a large block to trigger heap growth in its arena.
    // --------------------------------------------------------------------
    println!("\n[5] Allocating 64 KiB to trigger heap growth...");
    let big_block = allocate(64 * 1024);
    print_alloc("5", 64 * 1024, big_block);

    deallocate(second_block);
    deallocate(third_block);
    deallocate(fifth_block);
    deallocate(big_block);

    println!("\n[6] End of demo. Process exit releases every arena's mappings.");
  }
}
