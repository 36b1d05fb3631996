// Copyright 2022 bmc::labs Gmbh. All rights reserved.

use std::env;


fn main() {
  println!("cargo:rerun-if-env-changed=LJM_LIB_DIR");

  // only the `ljm` feature pulls in the vendor library; everything else,
  // tests included, runs against the simulated device.
  if env::var_os("CARGO_FEATURE_LJM").is_none() {
    return;
  }

  // LJM installs to a system location on both Linux and Windows. point
  // LJM_LIB_DIR at the directory holding libLabJackM.so or LabJackM.lib when
  // it lives somewhere else.
  if let Ok(lib_dir) = env::var("LJM_LIB_DIR") {
    println!(r"cargo:rustc-link-search=native={}", lib_dir);
  }

  println!(r"cargo:rustc-link-lib=dylib=LabJackM");
}
