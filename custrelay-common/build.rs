fn main() {
    let proto_file = "proto/updater.proto";
    println!("cargo:rerun-if-changed={proto_file}");
    tonic_build::configure()
        .build_server(true)
        .compile_protos(&[proto_file], &["proto"])
        .expect("updater proto compilation must succeed");
}
