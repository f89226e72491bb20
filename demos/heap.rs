use std::io::Read;

use libc::sbrk;
use tagheap::{Heap, MemorySource, SbrkSource, units::UNIT};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`,
/// `htop`, `gdb`, or just visually track how allocations move the
/// program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via
/// brk/sbrk; every arena growth pushes it up.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    unsafe { sbrk(0) },
  );
}

fn print_heap_state(
  label: &str,
  heap: &Heap<SbrkSource>,
) {
  println!(
    "[{}] arena = {} bytes obtained, {} bytes on the free list",
    label,
    heap.source().current_size(),
    heap.free_bytes(),
  );
}

fn main() {
  // A heap over the program break. The SbrkSource contract: nothing
  // else may move the break between our growth requests, so this demo
  // avoids library calls that malloc in the middle of the walkthrough.
  let mut heap = Heap::new(unsafe { SbrkSource::new() });

  // Initial state: nothing obtained yet, the arena bootstraps lazily.
  print_program_break("start");
  print_heap_state("start", &heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) First allocation. This bootstraps the sentinel and pulls one
  //    page from the source; the block is carved from the high end,
  //    leaving the free remainder at the low end of the page.
  // --------------------------------------------------------------------
  let first = heap.allocate(24).expect("arena can grow");
  println!("\n[1] Allocate 24 bytes, payload offset = {}", first);
  heap.payload_mut(first)[..8].copy_from_slice(b"DEADBEEF");
  print_heap_state("1", &heap);
  print_program_break("1");
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) A second allocation lands directly below the first one, carved
  //    from the same free remainder: no new page needed.
  // --------------------------------------------------------------------
  let second = heap.allocate(100).expect("arena can grow");
  println!("\n[2] Allocate 100 bytes, payload offset = {}", second);
  println!(
    "[2] second sits {} bytes below first",
    first - second
  );
  print_heap_state("2", &heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Free the first block and allocate something that fits in it.
  //    Next-fit search reuses the freed region instead of growing.
  // --------------------------------------------------------------------
  heap.free(Some(first));
  println!("\n[3] Freed the first block");
  print_heap_state("3", &heap);

  let reused = heap.allocate(16).expect("arena can grow");
  println!(
    "[3] Allocate 16 bytes -> offset {} ({})",
    reused,
    if reused == first {
      "reused the freed block"
    } else {
      "landed somewhere else"
    }
  );
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) Resize the second block upward. Its contents move to the new,
  //    larger block; the old extent joins the free list.
  // --------------------------------------------------------------------
  heap.payload_mut(second)[..5].copy_from_slice(b"hello");
  let grown = heap.resize(Some(second), 4000).expect("arena can grow");
  println!(
    "\n[4] Resized 100 -> 4000 bytes, offset {} -> {}, contents start with {:?}",
    second,
    grown,
    std::str::from_utf8(&heap.payload(grown)[..5]).unwrap(),
  );
  print_heap_state("4", &heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) A large allocation forces arena growth: watch the program break
  //    move by whole pages.
  // --------------------------------------------------------------------
  print_program_break("before large alloc");
  let big = heap.allocate(64 * 1024).expect("arena can grow");
  println!("\n[5] Allocate 64 KiB, payload offset = {}", big);
  print_program_break("after large alloc");
  print_heap_state("5", &heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 6) Free everything. Eager coalescing folds the whole arena back
  //    into a single free block: free bytes = obtained bytes minus the
  //    sentinel and one remaining tag pair.
  // --------------------------------------------------------------------
  heap.free(Some(reused));
  heap.free(Some(grown));
  heap.free(Some(big));
  println!("\n[6] Freed everything");
  print_heap_state("6", &heap);
  println!(
    "[6] fixed overhead = {} bytes (sentinel + one tag pair)",
    heap.source().current_size() - heap.free_bytes(),
  );
  assert_eq!(
    heap.free_bytes(),
    heap.source().current_size() - 4 * UNIT
  );
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 7) End of demo. Dropping the heap releases the source, which moves
  //    the program break back down if nothing else touched it.
  // --------------------------------------------------------------------
  println!("\n[7] End of demo. The source returns the break on drop.");
}
