// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Source-level GLSL reflection and the checks that stand in for a compiler.

use prism_core::renderer::{ShaderStage, UniformKind};

/// A `uniform` or `attribute` declaration found in a source.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Declaration {
    pub(super) type_name: String,
    pub(super) name: String,
    pub(super) array_len: usize,
}

const PRECISIONS: [&str; 3] = ["lowp", "mediump", "highp"];

/// Finds every top-level declaration introduced by `qualifier`.
pub(super) fn declarations(source: &str, qualifier: &str) -> Vec<Declaration> {
    let stripped: String = source
        .lines()
        .map(|line| line.split("//").next().unwrap_or(""))
        .filter(|line| !line.trim_start().starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n");

    let mut found = Vec::new();
    for statement in stripped.split(';') {
        let tokens: Vec<&str> = statement.split_whitespace().collect();
        let Some(start) = tokens.iter().position(|t| *t == qualifier) else {
            continue;
        };
        let mut rest = tokens[start + 1..]
            .iter()
            .filter(|t| !PRECISIONS.contains(t));
        let (Some(type_name), Some(raw_name)) = (rest.next(), rest.next()) else {
            continue;
        };
        // `name[8]` or `name [8]`
        let joined: String = std::iter::once(*raw_name).chain(rest.copied()).collect();
        let (name, array_len) = match joined.split_once('[') {
            Some((name, len)) => {
                let len = len.trim_end_matches(']').trim().parse().unwrap_or(1);
                (name.to_string(), len)
            }
            None => (joined, 1),
        };
        found.push(Declaration {
            type_name: type_name.to_string(),
            name,
            array_len,
        });
    }
    found
}

/// Pretends to compile one stage, returning a driver-style info log on failure.
pub(super) fn check_stage(stage: ShaderStage, source: &str) -> Result<(), String> {
    if source.trim().is_empty() {
        return Err(format!("ERROR: 0:0: empty {stage} shader source"));
    }
    for (i, line) in source.lines().enumerate() {
        if let Some(msg) = line.trim_start().strip_prefix("#error") {
            return Err(format!("ERROR: 0:{}: '#error' :{}", i + 1, msg));
        }
    }
    for decl in declarations(source, "uniform") {
        if UniformKind::from_glsl(&decl.type_name).is_none() {
            return Err(format!(
                "ERROR: 0:0: '{}' : unsupported uniform type '{}'",
                decl.name, decl.type_name
            ));
        }
    }
    if !source.contains("void main") {
        return Err(format!("ERROR: 0:0: {stage} shader has no main()"));
    }
    Ok(())
}

/// Merges the uniforms of both stages, keeping the first declaration of each name.
pub(super) fn program_uniforms(vertex: &str, fragment: &str) -> Vec<(UniformKind, Declaration)> {
    let mut merged: Vec<(UniformKind, Declaration)> = Vec::new();
    for decl in declarations(vertex, "uniform")
        .into_iter()
        .chain(declarations(fragment, "uniform"))
    {
        if merged.iter().any(|(_, d)| d.name == decl.name) {
            continue;
        }
        if let Some(kind) = UniformKind::from_glsl(&decl.type_name) {
            merged.push((kind, decl));
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: &str = "
        #define SHADER_NAME TEST_FS
        precision mediump float;
        uniform sampler2D uMainSampler[4];
        uniform   vec2 uResolution; // trailing comment: uniform float uFake;
        varying vec2 outTexCoord;
        void main() { gl_FragColor = texture2D(uMainSampler[0], outTexCoord); }
    ";

    #[test]
    fn finds_uniforms_with_arrays_and_precision() {
        let decls = declarations(FS, "uniform");
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].name, "uMainSampler");
        assert_eq!(decls[0].array_len, 4);
        assert_eq!(decls[1].type_name, "vec2");
        assert_eq!(decls[1].array_len, 1);
    }

    #[test]
    fn merges_stages_without_duplicates() {
        let vs = "uniform mat4 uProjectionMatrix; uniform vec2 uResolution; void main() {}";
        let merged = program_uniforms(vs, FS);
        let names: Vec<_> = merged.iter().map(|(_, d)| d.name.as_str()).collect();
        assert_eq!(names, ["uProjectionMatrix", "uResolution", "uMainSampler"]);
    }

    #[test]
    fn error_directive_fails_compilation_with_line() {
        let src = "void main() {}\n#error broken on purpose";
        let log = check_stage(ShaderStage::Vertex, src).unwrap_err();
        assert!(log.contains("0:2"));
        assert!(log.contains("broken on purpose"));
        assert!(check_stage(ShaderStage::Fragment, "  ").is_err());
        assert!(check_stage(ShaderStage::Fragment, "uniform float x;").is_err());
    }
}
