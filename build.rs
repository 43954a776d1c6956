use std::env;

fn main() {
    for variable in ["FFMPEG_DIR", "FFMPEG_PKG_CONFIG_PATH", "PKG_CONFIG_PATH"] {
        println!("cargo:rerun-if-env-changed={variable}");
    }

    // pkg-config finds FFmpeg on Unix; Windows builds need an explicit prefix.
    let windows = env::var("CARGO_CFG_TARGET_OS").is_ok_and(|os| os == "windows");
    if windows && env::var_os("FFMPEG_DIR").is_none() {
        println!(
            "cargo:warning=FFMPEG_DIR is not set; point it at an FFmpeg install (headers, libs and DLLs) so ffmpeg-sys-next can link thumbsheet."
        );
    }
}
