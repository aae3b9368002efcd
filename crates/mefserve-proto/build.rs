// Build script to compile protobuf files into Rust code.
//
// This runs at compile time and generates message structs and the service
// trait/client from proto/mefserve.proto.

fn main() -> Result<(), Box<dyn std::error::Error>> {
    std::env::set_var(
        "PROTOC",
        protoc_bin_vendored::protoc_bin_path().unwrap(),
    );
    tonic_build::compile_protos("proto/mefserve.proto")?;

    Ok(())
}
