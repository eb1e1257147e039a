//! WAT fixtures shared by the integration tests.
//!
//! Each fixture is a tiny module implementing one generation of the
//! transform ABI with a bump allocator and a `free_count` getter.

#![allow(dead_code)]

use proj_host::{HostConfig, LoadedModule, ModuleLoader, TransformHost};

/// Raw ABI: `out = (2x, y + 1[, z - 1])`. An empty target fails with
/// "bad crs"; an empty source fails with an empty last-error slot.
pub const RAW_MODULE: &str = r#"
(module
  (memory (export "memory") 1)
  (global $heap (mut i32) (i32.const 1024))
  (global $frees (mut i32) (i32.const 0))
  (global $err_ptr (mut i32) (i32.const 0))
  (global $err_len (mut i32) (i32.const 0))
  (data (i32.const 16) "bad crs")

  (func $malloc (export "malloc") (param $n i32) (result i32)
    (local $p i32)
    global.get $heap
    local.set $p
    global.get $heap
    local.get $n
    i32.add
    i32.const 7
    i32.add
    i32.const -8
    i32.and
    global.set $heap
    local.get $p)

  (func (export "free") (param i32)
    global.get $frees
    i32.const 1
    i32.add
    global.set $frees)

  (func (export "free_count") (result i32) global.get $frees)
  (func (export "last_error_message_ptr") (result i32) global.get $err_ptr)
  (func (export "last_error_message_len") (result i32) global.get $err_len)

  (func $check (param $fl i32) (param $tl i32) (result i32)
    local.get $fl
    i32.eqz
    if
      i32.const 2
      return
    end
    local.get $tl
    i32.eqz
    if
      i32.const 16
      global.set $err_ptr
      i32.const 7
      global.set $err_len
      i32.const 1
      return
    end
    i32.const 0)

  (func (export "transform2_known_crs_raw")
    (param $fp i32) (param $fl i32) (param $tp i32) (param $tl i32)
    (param $x f64) (param $y f64) (param $out i32) (result i32)
    (local $rc i32)
    local.get $fl
    local.get $tl
    call $check
    local.tee $rc
    if
      local.get $rc
      return
    end
    local.get $out
    local.get $x
    f64.const 2
    f64.mul
    f64.store
    local.get $out
    local.get $y
    f64.const 1
    f64.add
    f64.store offset=8
    i32.const 0)

  (func (export "transform3_known_crs_raw")
    (param $fp i32) (param $fl i32) (param $tp i32) (param $tl i32)
    (param $x f64) (param $y f64) (param $z f64) (param $out i32) (result i32)
    (local $rc i32)
    local.get $fl
    local.get $tl
    call $check
    local.tee $rc
    if
      local.get $rc
      return
    end
    local.get $out
    local.get $x
    f64.const 2
    f64.mul
    f64.store
    local.get $out
    local.get $y
    f64.const 1
    f64.add
    f64.store offset=8
    local.get $out
    local.get $z
    f64.const 1
    f64.sub
    f64.store offset=16
    i32.const 0))
"#;

/// Raw ABI module whose output is `(hash(from), hash(to))`, with
/// `hash = fold(h * 31 + byte)` over the staged bytes.
pub const ECHO_MODULE: &str = r#"
(module
  (memory (export "memory") 1)
  (global $heap (mut i32) (i32.const 1024))

  (func (export "malloc") (param $n i32) (result i32)
    (local $p i32)
    global.get $heap
    local.set $p
    global.get $heap
    local.get $n
    i32.add
    i32.const 7
    i32.add
    i32.const -8
    i32.and
    global.set $heap
    local.get $p)

  (func (export "last_error_message_ptr") (result i32) i32.const 0)
  (func (export "last_error_message_len") (result i32) i32.const 0)

  (func $hash (param $p i32) (param $n i32) (result f64)
    (local $h i64) (local $i i32)
    block $done
      loop $next
        local.get $i
        local.get $n
        i32.ge_u
        br_if $done
        local.get $h
        i64.const 31
        i64.mul
        local.get $p
        local.get $i
        i32.add
        i32.load8_u
        i64.extend_i32_u
        i64.add
        local.set $h
        local.get $i
        i32.const 1
        i32.add
        local.set $i
        br $next
      end
    end
    local.get $h
    f64.convert_i64_u)

  (func (export "transform2_known_crs_raw")
    (param $fp i32) (param $fl i32) (param $tp i32) (param $tl i32)
    (param $x f64) (param $y f64) (param $out i32) (result i32)
    local.get $out
    local.get $fp
    local.get $fl
    call $hash
    f64.store
    local.get $out
    local.get $tp
    local.get $tl
    call $hash
    f64.store offset=8
    i32.const 0))
"#;

/// Typed ABI: same arithmetic as [`RAW_MODULE`].
///
/// Like wasm-bindgen, the transform frees its own string arguments. An
/// empty target returns the freshly allocated error string "unknown crs";
/// an empty source returns an error string pointer outside memory.
/// `__wbindgen_free` keeps one flag byte per 8-byte slot at 60000 and
/// counts any pointer freed twice in `double_frees`.
pub const TYPED_MODULE: &str = r#"
(module
  (memory (export "memory") 1)
  (global $heap (mut i32) (i32.const 1024))
  (global $frees (mut i32) (i32.const 0))
  (global $double_frees (mut i32) (i32.const 0))
  (data (i32.const 16) "unknown crs")

  (func $malloc (export "__wbindgen_malloc") (param $n i32) (param $align i32) (result i32)
    (local $p i32)
    global.get $heap
    local.set $p
    global.get $heap
    local.get $n
    i32.add
    i32.const 8
    i32.add
    i32.const -8
    i32.and
    global.set $heap
    local.get $p)

  (func $free (export "__wbindgen_free") (param $p i32) (param $n i32) (param $align i32)
    (local $flag i32)
    global.get $frees
    i32.const 1
    i32.add
    global.set $frees
    local.get $p
    i32.const 3
    i32.shr_u
    i32.const 60000
    i32.add
    local.set $flag
    local.get $flag
    i32.load8_u
    if
      global.get $double_frees
      i32.const 1
      i32.add
      global.set $double_frees
    end
    local.get $flag
    i32.const 1
    i32.store8)

  (func (export "free_count") (result i32) global.get $frees)
  (func (export "double_frees") (result i32) global.get $double_frees)

  (func (export "transform2_known_crs")
    (param $ret i32) (param $fp i32) (param $fl i32) (param $tp i32) (param $tl i32)
    (param $x f64) (param $y f64)
    (local $v i32)
    local.get $fp
    local.get $fl
    i32.const 1
    call $free
    local.get $tp
    local.get $tl
    i32.const 1
    call $free
    local.get $fl
    i32.eqz
    if
      local.get $ret
      i32.const 0
      i32.store
      local.get $ret
      i32.const 0
      i32.store offset=4
      local.get $ret
      i32.const 0x7fff0000
      i32.store offset=8
      local.get $ret
      i32.const 5
      i32.store offset=12
      return
    end
    local.get $tl
    i32.eqz
    if
      i32.const 11
      i32.const 1
      call $malloc
      local.set $v
      local.get $v
      i32.const 16
      i32.const 11
      memory.copy
      local.get $ret
      i32.const 0
      i32.store
      local.get $ret
      i32.const 0
      i32.store offset=4
      local.get $ret
      local.get $v
      i32.store offset=8
      local.get $ret
      i32.const 11
      i32.store offset=12
      return
    end
    i32.const 16
    i32.const 8
    call $malloc
    local.set $v
    local.get $v
    local.get $x
    f64.const 2
    f64.mul
    f64.store
    local.get $v
    local.get $y
    f64.const 1
    f64.add
    f64.store offset=8
    local.get $ret
    local.get $v
    i32.store
    local.get $ret
    i32.const 2
    i32.store offset=4
    local.get $ret
    i32.const 0
    i32.store offset=8
    local.get $ret
    i32.const 0
    i32.store offset=12))
"#;

/// Raw ABI without `malloc`; the transform must never run.
pub const MISSING_MALLOC_MODULE: &str = r#"
(module
  (memory (export "memory") 1)
  (func (export "last_error_message_ptr") (result i32) i32.const 0)
  (func (export "last_error_message_len") (result i32) i32.const 0)
  (func (export "transform2_known_crs_raw")
    (param i32 i32 i32 i32 f64 f64 i32) (result i32)
    unreachable))
"#;

/// Raw ABI module exercising the shim imports.
///
/// - `_initialize` calls `fd_write` before memory is published and keeps
///   the status in `init_rc`
/// - the transform writes "hello" and " world" to fd 1, probes
///   `__syscall_getcwd` and returns `(syscall status, bytes written)`
/// - an empty source calls `proc_exit(3)`
pub const SHIM_MODULE: &str = r#"
(module
  (import "wasi_snapshot_preview1" "fd_write" (func $fd_write (param i32 i32 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "proc_exit" (func $proc_exit (param i32)))
  (import "env" "__syscall_getcwd" (func $getcwd (param i32 i32) (result i32)))
  (memory (export "memory") 1)
  (global $heap (mut i32) (i32.const 1024))
  (global $init_rc (mut i32) (i32.const -1))
  (data (i32.const 100) "hello")
  (data (i32.const 110) " world")
  (data (i32.const 200) "\64\00\00\00\05\00\00\00")
  (data (i32.const 208) "\6e\00\00\00\06\00\00\00")

  (func (export "_initialize")
    i32.const 1
    i32.const 200
    i32.const 1
    i32.const 300
    call $fd_write
    global.set $init_rc)

  (func (export "init_rc") (result i32) global.get $init_rc)

  (func (export "malloc") (param $n i32) (result i32)
    (local $p i32)
    global.get $heap
    local.set $p
    global.get $heap
    local.get $n
    i32.add
    i32.const 7
    i32.add
    i32.const -8
    i32.and
    global.set $heap
    local.get $p)

  (func (export "last_error_message_ptr") (result i32) i32.const 0)
  (func (export "last_error_message_len") (result i32) i32.const 0)

  (func (export "transform2_known_crs_raw")
    (param $fp i32) (param $fl i32) (param $tp i32) (param $tl i32)
    (param $x f64) (param $y f64) (param $out i32) (result i32)
    local.get $fl
    i32.eqz
    if
      i32.const 3
      call $proc_exit
    end
    i32.const 1
    i32.const 200
    i32.const 1
    i32.const 300
    call $fd_write
    drop
    i32.const 1
    i32.const 208
    i32.const 1
    i32.const 300
    call $fd_write
    drop
    local.get $out
    i32.const 0
    i32.const 0
    call $getcwd
    f64.convert_i32_s
    f64.store
    local.get $out
    i32.const 300
    i32.load
    f64.convert_i32_u
    f64.store offset=8
    i32.const 0))
"#;

/// Module importing the whole `env` syscall table with Emscripten
/// signatures. `syscall_sum` calls each entry once with non-zero
/// arguments and returns the sum of the results.
pub const SYSCALL_MODULE: &str = r#"
(module
  (import "env" "__syscall_faccessat" (func $faccessat (param i32 i32 i32 i32) (result i32)))
  (import "env" "__syscall_chmod" (func $chmod (param i32 i32) (result i32)))
  (import "env" "__syscall_fchmod" (func $fchmod (param i32 i32) (result i32)))
  (import "env" "__syscall_fchown32" (func $fchown32 (param i32 i32 i32) (result i32)))
  (import "env" "__syscall_ftruncate64" (func $ftruncate64 (param i32 i64) (result i32)))
  (import "env" "__syscall_getcwd" (func $getcwd (param i32 i32) (result i32)))
  (import "env" "__syscall_readlinkat" (func $readlinkat (param i32 i32 i32 i32) (result i32)))
  (import "env" "__syscall_rmdir" (func $rmdir (param i32) (result i32)))
  (import "env" "__syscall_unlinkat" (func $unlinkat (param i32 i32 i32) (result i32)))
  (import "env" "__syscall_utimensat" (func $utimensat (param i32 i32 i32 i32) (result i32)))
  (memory (export "memory") 1)
  (func (export "malloc") (param i32) (result i32) i32.const 1024)
  (func (export "last_error_message_ptr") (result i32) i32.const 0)
  (func (export "last_error_message_len") (result i32) i32.const 0)
  (func (export "transform2_known_crs_raw")
    (param i32 i32 i32 i32 f64 f64 i32) (result i32)
    i32.const 1)

  (func (export "syscall_sum") (result i32)
    i32.const -100
    i32.const 64
    i32.const 4
    i32.const 512
    call $faccessat
    i32.const 64
    i32.const 420
    call $chmod
    i32.add
    i32.const 3
    i32.const 493
    call $fchmod
    i32.add
    i32.const 3
    i32.const 1000
    i32.const 1000
    call $fchown32
    i32.add
    i32.const 3
    i64.const 0x1_0000_0000
    call $ftruncate64
    i32.add
    i32.const 128
    i32.const 256
    call $getcwd
    i32.add
    i32.const -100
    i32.const 64
    i32.const 128
    i32.const 256
    call $readlinkat
    i32.add
    i32.const 64
    call $rmdir
    i32.add
    i32.const -100
    i32.const 64
    i32.const 512
    call $unlinkat
    i32.add
    i32.const -100
    i32.const 64
    i32.const 128
    i32.const 256
    call $utimensat
    i32.add))
"#;

/// Compile a WAT fixture.
pub fn wasm(wat: &str) -> Vec<u8> {
    wat::parse_str(wat).expect("invalid test module")
}

/// Build a host over a WAT fixture.
pub fn host(wat: &str, config: HostConfig) -> TransformHost {
    TransformHost::from_bytes("fixture", &wasm(wat), config).expect("failed to create host")
}

/// Instantiate a WAT fixture without the host facade.
pub fn module(wat: &str, config: HostConfig) -> LoadedModule {
    let loader = ModuleLoader::new(config).expect("failed to create loader");
    let image = loader
        .load_module_bytes("fixture", &wasm(wat))
        .expect("failed to compile module");
    loader.instantiate(&image).expect("failed to instantiate")
}

/// Hash used by [`ECHO_MODULE`].
pub fn echo_hash(text: &str) -> f64 {
    text.bytes()
        .fold(0u64, |h, b| h.wrapping_mul(31).wrapping_add(b as u64)) as f64
}
