use std::env;
use std::fs;
use std::path::Path;

const SHADERS: &[(&str, &str)] = &[("src/shader/relative_error.comp", "relative_error.spv")];

#[cfg(feature = "shaders")]
fn compile_shader(compiler: &shaderc::Compiler, shader_path: &str, output_name: &str) {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    let out_path = Path::new(&out_dir).join(output_name);
    let shader_source =
        fs::read_to_string(shader_path).unwrap_or_else(|_| panic!("Failed to read shader source: {}", shader_path));
    let compile_options = shaderc::CompileOptions::new().expect("Failed to init compile options");
    let binary_result = compiler
        .compile_into_spirv(&shader_source, shaderc::ShaderKind::Compute, shader_path, "main", Some(&compile_options))
        .unwrap_or_else(|err| panic!("Failed to compile shader {}: {}", shader_path, err));
    fs::write(&out_path, binary_result.as_binary_u8())
        .unwrap_or_else(|_| panic!("Failed to write SPIR-V: {}", output_name));
}

fn write_empty_shaders() {
    let out_dir = env::var("OUT_DIR").expect("OUT_DIR not set");
    for (_, output_name) in SHADERS {
        fs::write(Path::new(&out_dir).join(output_name), b"").expect("Failed to write placeholder SPIR-V");
    }
}

fn main() {
    for (shader_path, _) in SHADERS {
        println!("cargo:rerun-if-changed={}", shader_path);
    }

    #[cfg(feature = "shaders")]
    {
        match shaderc::Compiler::new() {
            Ok(compiler) => {
                for (shader_path, output_name) in SHADERS {
                    compile_shader(&compiler, shader_path, output_name);
                }
                return;
            }
            Err(_) => println!("cargo:warning=shaderc not available, Vulkan backend will be disabled"),
        }
    }

    // Empty SPIR-V makes the Vulkan backend report itself unavailable at runtime.
    write_empty_shaders();
}
