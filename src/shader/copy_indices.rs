//! Copies the sorted payload values out to a separate index buffer, up to
//! the live count. Dispatched over the full capacity so the host never needs
//! the count.

vulkano_shaders::shader! {
    ty: "compute",
    src: r"
        #version 460

        layout(local_size_x = 1024) in;

        layout(push_constant) uniform PushConstants {
            uint counter_offset;
        };

        layout(set = 0, binding = 0) readonly buffer Values {
            uint values[];
        };

        layout(set = 0, binding = 1) writeonly buffer Indices {
            uint indices[];
        };

        layout(set = 0, binding = 2) readonly buffer Counter {
            uint counter[];
        };

        void main() {
            uint count = counter[counter_offset];
            uint i = gl_GlobalInvocationID.x;
            if (i < count) {
                indices[i] = values[i];
            }
        }
    ",
}
