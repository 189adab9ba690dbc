fn main() {
    println!("cargo:rerun-if-changed=cbindgen.toml");

    #[cfg(feature = "generate-c-header")]
    {
        use std::env;
        use std::path::PathBuf;

        let crate_dir = PathBuf::from(env::var_os("CARGO_MANIFEST_DIR").unwrap());
        cbindgen::Builder::new()
            .with_crate(&crate_dir)
            .with_config(cbindgen::Config::from_root_or_default(&crate_dir))
            .generate()
            .expect("Unable to generate bindings")
            .write_to_file(crate_dir.join("include").join("sourceinfo.h"));
    }
}
