//! Blender scene-script generation.
//!
//! The render stage drives Blender in background mode with a generated
//! Python script. The script owns the progress/completion lines the
//! stage watches for, so their formats live here next to the template.

use std::path::Path;

use aforge_models::RenderSettings;

/// Line the script prints when every frame has been written.
pub const COMPLETION_MARKER: &str = "RENDER_COMPLETE";

/// Two-capture pattern for the script's per-frame progress lines.
pub const PROGRESS_LINE_PATTERN: &str = r"PROGRESS: Frame (\d+)/(\d+)";

/// How often the render loop reports progress, in frames.
const PROGRESS_EVERY_FRAMES: u32 = 10;

/// Strip characters that could escape the Python string literal the
/// prompt is embedded in. Keeps word characters and basic punctuation.
pub fn sanitize_prompt(prompt: &str) -> String {
    prompt
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | ',' | '.' | '!' | '?' | '-'))
        .collect()
}

/// Build the Python driver script for one animation.
///
/// The pipeline relies on the invocation contract only: frames land in
/// `frames_dir` as `frame_%03d.png`, progress is printed every few
/// frames as `PROGRESS: Frame n/total`, and the completion marker is
/// the last line on success.
pub fn build_script(prompt: &str, frames_dir: &Path, settings: &RenderSettings) -> String {
    let prompt = sanitize_prompt(prompt);
    let frames_dir = frames_dir.to_string_lossy().replace('\\', "/");
    let frame_count = settings.frame_count;
    let fps = settings.fps;
    let width = settings.width;
    let height = settings.height;
    let resolution_percent = settings.resolution_percent;

    format!(
        r#"import bpy
import math
import os

# Fresh scene
bpy.ops.wm.read_factory_settings(use_empty=True)

scene = bpy.context.scene
scene.frame_start = 1
scene.frame_end = {frame_count}
scene.render.fps = {fps}

output_dir = "{frames_dir}"
os.makedirs(output_dir, exist_ok=True)

# Lighting
bpy.ops.object.light_add(type='SUN', location=(10, -10, 15))
bpy.context.object.data.energy = 3.0
bpy.ops.object.light_add(type='AREA', location=(0, 0, 10))
area = bpy.context.object
area.data.energy = 1.5
area.data.size = 5.0

# Camera with a slow push-in
bpy.ops.object.camera_add(location=(12, -12, 8))
camera = bpy.context.object
camera.rotation_euler = (1.1, 0, 0.785)
scene.camera = camera
camera.keyframe_insert(data_path="location", frame=1)
camera.location = (8, -15, 6)
camera.keyframe_insert(data_path="location", frame={frame_count} // 2)
camera.location = (15, -8, 10)
camera.keyframe_insert(data_path="location", frame={frame_count})

# Ground
bpy.ops.mesh.primitive_plane_add(size=20, location=(0, 0, -1))
ground = bpy.context.object
mat = bpy.data.materials.new(name="Ground")
mat.use_nodes = True
mat.node_tree.nodes["Principled BSDF"].inputs[0].default_value = (0.1, 0.8, 0.1, 1.0)
ground.data.materials.append(mat)

# Blocky character
bpy.ops.mesh.primitive_cube_add(size=1.8, location=(0, 0, 0.9))
body = bpy.context.object
bpy.ops.mesh.primitive_cube_add(size=1.0, location=(0, 0, 2.4))
head = bpy.context.object
mat = bpy.data.materials.new(name="Character")
mat.use_nodes = True
mat.node_tree.nodes["Principled BSDF"].inputs[0].default_value = (0.4, 0.7, 1.0, 1.0)
for obj in (body, head):
    obj.data.materials.append(mat)

prompt = "{prompt}"

if "walk" in prompt:
    body.location = (0, 0, 0.9)
    body.keyframe_insert(data_path="location", frame=1)
    body.location = (10, 0, 0.9)
    body.keyframe_insert(data_path="location", frame={frame_count})

if "dance" in prompt:
    for f in range(1, {frame_count} + 1, 40):
        body.location = (0, 0, 0.9 + 0.5 * math.sin(f / 20))
        body.keyframe_insert(data_path="location", frame=f)
        body.rotation_euler = (0, 0, math.sin(f / 10) * 0.5)
        body.keyframe_insert(data_path="rotation_euler", frame=f)

if "build" in prompt:
    for i in range(5):
        bpy.ops.mesh.primitive_cube_add(location=(2 + i, 2, 0))
        block = bpy.context.object
        start = ({frame_count} // 5) * i + 1
        block.scale = (0, 0, 0)
        block.keyframe_insert(data_path="scale", frame=start)
        block.scale = (1, 1, 1)
        block.keyframe_insert(data_path="scale", frame=start + {fps} * 2)

# Render settings
scene.render.engine = 'CYCLES'
scene.render.image_settings.file_format = 'PNG'
scene.render.image_settings.color_mode = 'RGBA'
scene.render.resolution_x = {width}
scene.render.resolution_y = {height}
scene.render.resolution_percentage = {resolution_percent}

for frame in range(1, {frame_count} + 1):
    scene.frame_set(frame)
    scene.render.filepath = os.path.join(output_dir, f"frame_{{frame:03d}}.png")
    bpy.ops.render.render(write_still=True)
    if frame % {progress_every} == 0:
        print(f"PROGRESS: Frame {{frame}}/{frame_count}", flush=True)

print("{marker}", flush=True)
"#,
        frame_count = frame_count,
        fps = fps,
        frames_dir = frames_dir,
        prompt = prompt,
        width = width,
        height = height,
        resolution_percent = resolution_percent,
        progress_every = PROGRESS_EVERY_FRAMES,
        marker = COMPLETION_MARKER,
    )
}
