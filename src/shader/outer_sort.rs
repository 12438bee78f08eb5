//! One global-memory sub-stage of a top-level merge, at distance `j` of the
//! merge of width `k`. Each thread owns one comparison; pairs whose higher
//! index lies past the live count are skipped, since their partner would
//! compare against a tail sentinel and never swap.

vulkano_shaders::shader! {
    ty: "compute",
    src: r"
        #version 460

        layout(local_size_x = 1024) in;

        layout(push_constant) uniform PushConstants {
            float sort_sign;
            uint counter_offset;
            uint k;
            uint j;
        };

        layout(set = 0, binding = 0) buffer Keys {
            float keys[];
        };

        layout(set = 0, binding = 1) buffer Values {
            uint values[];
        };

        layout(set = 0, binding = 2) readonly buffer Counter {
            uint counter[];
        };

        uint insert_one_bit(uint value, uint one_bit_mask) {
            uint mask = one_bit_mask - 1;
            return ((value & ~mask) << 1) | (value & mask) | one_bit_mask;
        }

        void main() {
            uint count = counter[counter_offset];
            uint index2 = insert_one_bit(gl_GlobalInvocationID.x, j);
            if (index2 >= count) {
                return;
            }
            uint index1 = index2 ^ (k == 2 * j ? k - 1 : j);

            float key1 = keys[index1];
            float key2 = keys[index2];
            if (key2 * sort_sign < key1 * sort_sign) {
                keys[index1] = key2;
                keys[index2] = key1;
                uint value = values[index1];
                values[index1] = values[index2];
                values[index2] = value;
            }
        }
    ",
}
