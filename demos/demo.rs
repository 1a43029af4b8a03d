use std::io::Read;

use libc::sbrk;
use rallocator::{allocate, release, resize, zero_allocate};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
unsafe fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn main() {
  unsafe {
    print_program_break("start");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 1) Allocate 4 bytes and write a pattern into them.
    // --------------------------------------------------------------------
    let first_block = allocate(4);
    println!("\n[1] allocate(4) -> {:?}", first_block);
    (first_block as *mut u32).write(0xDEADBEEF);
    println!("[1] value written = 0x{:X}", (first_block as *mut u32).read());
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Allocate 12 bytes, an "odd-sized" request after 8-byte rounding.
    // --------------------------------------------------------------------
    let second_block = allocate(12);
    println!("\n[2] allocate(12) -> {:?}", second_block);
    std::ptr::write_bytes(second_block, 0xAB, 12);
    println!("[2] initialized second block with 0xAB");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Allocate an 8-byte value and confirm alignment.
    // --------------------------------------------------------------------
    let third_block = allocate(8);
    println!("\n[3] allocate(8) -> {:?}", third_block);
    (third_block as *mut u64).write(0x1122334455667788);
    let addr = third_block as usize;
    println!("[3] address = {:#X}, addr % 8 = {}", addr, addr % 8);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Zero-allocate an array of 16 u16s and confirm it's zeroed.
    // --------------------------------------------------------------------
    let fourth_block = zero_allocate(16, 2);
    println!("\n[4] zero_allocate(16, 2) -> {:?}", fourth_block);
    let fourth_ptr = fourth_block as *mut u16;
    for i in 0..16 {
      assert_eq!(fourth_ptr.add(i).read(), 0);
      fourth_ptr.add(i).write(i as u16);
    }
    println!("[4] confirmed zero-fill, then wrote 0..15 into it");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Release the first block.
    // --------------------------------------------------------------------
    release(first_block);
    println!("\n[5] released first_block at {:?}", first_block);
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 6) Allocate a small block and see if the free list reuses it.
    // --------------------------------------------------------------------
    let fifth_block = allocate(2);
    println!("\n[6] allocate(2) -> {:?}", fifth_block);
    println!(
      "[6] fifth_block == first_block? {}",
      if fifth_block == first_block {
        "yes, reused the just-released block"
      } else {
        "no, it landed somewhere else"
      }
    );
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 7) Resize the fourth block, preserving its contents.
    // --------------------------------------------------------------------
    let grown = resize(fourth_block, 64);
    println!("\n[7] resize(fourth_block, 64) -> {:?}", grown);
    let grown_ptr = grown as *mut u16;
    for i in 0..16 {
      assert_eq!(grown_ptr.add(i).read(), i as u16);
    }
    println!("[7] confirmed the first 32 bytes survived the move");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 8) Allocate something past the large-object threshold. This routes
    //    through mmap instead of sbrk, so sbrk(0) shouldn't move.
    // --------------------------------------------------------------------
    print_program_break("before large alloc");
    let big_block = allocate(256 * 1024);
    println!("\n[8] allocate(256 KiB) -> {:?}", big_block);
    print_program_break("after large alloc");
    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 9) Clean up.
    // --------------------------------------------------------------------
    release(second_block);
    release(third_block);
    release(fifth_block);
    release(grown);
    release(big_block);
    println!("\n[9] end of demo, all blocks released.");
  }
}
