fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Only rerun if proto files change
    println!("cargo:rerun-if-changed=proto/rideline.proto");

    // Supply a protoc binary from the vendored package so codegen works on
    // hosts without a system protoc installed.
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        // Event payloads are carried as JSON on the broker and the WebSocket
        // boundary, so the generated types double as wire types.
        .type_attribute(".rideline", "#[derive(serde::Serialize, serde::Deserialize)]")
        .type_attribute(".rideline", "#[serde(default)]")
        .compile_protos(&["proto/rideline.proto"], &["proto"])?;
    Ok(())
}
